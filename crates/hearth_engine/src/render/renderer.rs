//! Frame renderer
//!
//! [`RenderManager::render_frame`] turns one frame of scene submissions into
//! device commands, in a fixed pass order:
//!
//! 1. shadow pass: shadow casters into the shadow map, from the first
//!    shadow-casting directional light
//! 2. main pass: lit models into the offscreen target, light block applied once
//! 3. skybox pass, when a skybox was queued
//! 4. sprite pass: persistent and transient sprites, batched
//! 5. blit pass: offscreen target onto the swapchain
//!
//! followed by a commit. Pipeline and binding changes are elided when they
//! would not change device state.

use super::camera::CameraData;
use super::device::{
    Bindings, ClearFlags, GraphicsDevice, PassDesc, Pipeline, RenderTarget, TextureHandle, UniformSlot,
};
use super::lighting::{LightData, LightType, LightUniformBlock};
use super::scene::{FrameSubmissions, ModelSubmission, SceneAssembly};
use super::sprite_registry::{build_batches, sprite_order, Sprite, SpriteInstance, SpriteSceneData};
use super::RenderError;
use crate::assets::{AssetManager, MeshData};
use crate::config::EngineConfig;
use crate::ecs::Component;
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use bytemuck::{Pod, Zeroable};

/// Light direction used for the shadow pass when no light casts shadows
const FALLBACK_SHADOW_DIRECTION: [f32; 3] = [-0.3, -1.0, -0.5];

/// Camera uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Column-major view-projection matrix
    pub view_projection: [[f32; 4]; 4],
    /// xyz eye position, w free for pass-specific use
    pub camera_position: [f32; 4],
}

/// Per-draw uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniforms {
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
    /// RGBA color multiplier
    pub tint: [f32; 4],
}

/// Shadow-caster uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightSpaceUniforms {
    /// Column-major world-to-light-clip matrix
    pub light_space: [[f32; 4]; 4],
}

/// Renderer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Clear color of the main pass
    pub clear_color: [f32; 4],
    /// Half extent of the shadow frustum around the camera
    pub shadow_extent: f32,
    /// Target width in pixels, for sprite projection
    pub width: u32,
    /// Target height in pixels, for sprite projection
    pub height: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RenderSettings {
    /// Settings from the engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            clear_color: config.clear_color,
            shadow_extent: 20.0,
            width: config.window.width,
            height: config.window.height,
        }
    }
}

/// Counters of one rendered frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Draw calls issued
    pub draw_calls: u32,
    /// Pipelines applied
    pub pipeline_changes: u32,
    /// Bindings applied
    pub binding_changes: u32,
    /// Bindings skipped because they matched device state
    pub bindings_elided: u32,
    /// Models drawn in the main pass
    pub models_drawn: u32,
    /// Models skipped because their asset is missing
    pub models_skipped: u32,
    /// Lights in the light block
    pub lights: u32,
    /// Sprite batches drawn
    pub sprite_batches: u32,
    /// Sprites drawn
    pub sprites: u32,
}

impl Component for RenderStats {}

struct MeshDraw<'a> {
    submission: &'a ModelSubmission,
    mesh: &'a MeshData,
}

/// Frame renderer with redundant-state elision
#[derive(Debug, Default)]
pub struct RenderManager {
    settings: RenderSettings,
    current_pipeline: Option<Pipeline>,
    current_bindings: Option<Bindings>,
    frames_rendered: u64,
}

impl RenderManager {
    /// Create a renderer
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            current_pipeline: None,
            current_bindings: None,
            frames_rendered: 0,
        }
    }

    /// Renderer settings
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Number of committed frames
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Render and commit one frame, consuming the scene's per-frame submissions
    pub fn render_frame(
        &mut self,
        scene: &SceneAssembly,
        assets: &AssetManager,
        device: &mut dyn GraphicsDevice,
    ) -> Result<RenderStats, RenderError> {
        let frame = scene.take_frame();
        let camera = scene.camera().unwrap_or_default();
        let ambient = scene.ambient();
        let persistent = scene.with_sprite_registry(SpriteSceneData::sorted_sprites);

        let mut stats = RenderStats {
            lights: frame.lights.len() as u32,
            ..RenderStats::default()
        };

        let draws = resolve_meshes(&frame, assets, &mut stats);
        let light_space = light_space_matrix(
            shadow_direction(&frame.lights),
            camera.position,
            self.settings.shadow_extent,
        );
        let light_space = LightSpaceUniforms {
            light_space: light_space.into(),
        };

        // Shadow pass
        self.begin_pass(device, &PassDesc::clearing(RenderTarget::ShadowMap, ClearFlags::DEPTH, [0.0; 4]))?;
        self.apply_pipeline(device, Pipeline::ShadowDepth, &mut stats)?;
        device.apply_uniforms(UniformSlot::LightSpace, bytemuck::bytes_of(&light_space))?;
        for draw in draws.iter().filter(|draw| draw.submission.cast_shadows) {
            self.apply_bindings(device, Bindings::mesh(draw.mesh.mesh, None), &mut stats)?;
            self.draw_mesh(device, draw, &mut stats)?;
        }
        device.end_pass()?;

        // Main pass
        self.begin_pass(
            device,
            &PassDesc::clearing(RenderTarget::Offscreen, ClearFlags::COLOR | ClearFlags::DEPTH, self.settings.clear_color),
        )?;
        self.apply_pipeline(device, Pipeline::Lit, &mut stats)?;
        let frame_uniforms = FrameUniforms {
            view_projection: camera.view_projection().into(),
            camera_position: [camera.position.x, camera.position.y, camera.position.z, 1.0],
        };
        device.apply_uniforms(UniformSlot::Frame, bytemuck::bytes_of(&frame_uniforms))?;
        let light_block = LightUniformBlock::from_lights(&frame.lights, ambient.color, ambient.intensity);
        device.apply_uniforms(UniformSlot::Lights, bytemuck::bytes_of(&light_block))?;
        device.apply_uniforms(UniformSlot::LightSpace, bytemuck::bytes_of(&light_space))?;
        for draw in &draws {
            let texture = draw.mesh.texture.unwrap_or(TextureHandle::WHITE);
            self.apply_bindings(device, Bindings::mesh(draw.mesh.mesh, Some(texture)).with_shadow_map(), &mut stats)?;
            self.draw_mesh(device, draw, &mut stats)?;
        }
        stats.models_drawn = frame.models.len() as u32 - stats.models_skipped;
        device.end_pass()?;

        if let Some(skybox) = frame.skybox {
            self.begin_pass(device, &PassDesc::loading(RenderTarget::Offscreen))?;
            self.apply_pipeline(device, Pipeline::Skybox, &mut stats)?;
            self.apply_bindings(device, Bindings::texture(skybox.texture), &mut stats)?;
            let sky_uniforms = FrameUniforms {
                view_projection: camera.rotation_only_view_projection().into(),
                camera_position: [0.0, 0.0, 0.0, skybox.intensity],
            };
            device.apply_uniforms(UniformSlot::Frame, bytemuck::bytes_of(&sky_uniforms))?;
            // Unit cube generated in the vertex shader
            self.draw(device, 0, 36, 1, &mut stats)?;
            device.end_pass()?;
        }

        let sprites = merge_sprites(persistent, frame.sprites);
        if !sprites.is_empty() {
            self.sprite_pass(device, &sprites, &mut stats)?;
        }

        self.begin_pass(device, &PassDesc::clearing(RenderTarget::Swapchain, ClearFlags::COLOR, [0.0, 0.0, 0.0, 1.0]))?;
        self.apply_pipeline(device, Pipeline::Blit, &mut stats)?;
        self.apply_bindings(device, Bindings::texture(TextureHandle::OFFSCREEN), &mut stats)?;
        // Fullscreen triangle
        self.draw(device, 0, 3, 1, &mut stats)?;
        device.end_pass()?;

        device.commit()?;
        self.frames_rendered += 1;
        log::trace!("frame {} rendered: {stats:?}", self.frames_rendered);
        Ok(stats)
    }

    fn sprite_pass(
        &mut self,
        device: &mut dyn GraphicsDevice,
        sprites: &[Sprite],
        stats: &mut RenderStats,
    ) -> Result<(), RenderError> {
        self.begin_pass(device, &PassDesc::loading(RenderTarget::Offscreen))?;

        let projection = Mat4::orthographic(
            0.0,
            self.settings.width.max(1) as f32,
            self.settings.height.max(1) as f32,
            0.0,
            -1.0,
            1000.0,
        );
        let screen = FrameUniforms {
            view_projection: projection.into(),
            camera_position: [0.0; 4],
        };

        for (index, batch) in build_batches(sprites).into_iter().enumerate() {
            let pipeline = if batch.alpha {
                Pipeline::SpriteAlpha
            } else {
                Pipeline::SpriteOpaque
            };
            self.apply_pipeline(device, pipeline, stats)?;
            if index == 0 {
                device.apply_uniforms(UniformSlot::Frame, bytemuck::bytes_of(&screen))?;
            }
            self.apply_bindings(device, Bindings::texture(batch.texture), stats)?;

            let instances: Vec<SpriteInstance> = sprites[batch.start..batch.start + batch.count]
                .iter()
                .map(Sprite::instance)
                .collect();
            device.apply_uniforms(UniformSlot::SpriteInstances, bytemuck::cast_slice(&instances))?;
            self.draw(device, 0, 6, batch.count as u32, stats)?;

            stats.sprite_batches += 1;
            stats.sprites += batch.count as u32;
        }

        device.end_pass()
    }

    fn begin_pass(&mut self, device: &mut dyn GraphicsDevice, pass: &PassDesc) -> Result<(), RenderError> {
        // Device state does not survive a pass boundary
        self.current_pipeline = None;
        self.current_bindings = None;
        device.begin_pass(pass)
    }

    fn apply_pipeline(
        &mut self,
        device: &mut dyn GraphicsDevice,
        pipeline: Pipeline,
        stats: &mut RenderStats,
    ) -> Result<(), RenderError> {
        if self.current_pipeline == Some(pipeline) {
            return Ok(());
        }
        device.apply_pipeline(pipeline)?;
        self.current_pipeline = Some(pipeline);
        // New pipelines start without bindings
        self.current_bindings = None;
        stats.pipeline_changes += 1;
        Ok(())
    }

    fn apply_bindings(
        &mut self,
        device: &mut dyn GraphicsDevice,
        bindings: Bindings,
        stats: &mut RenderStats,
    ) -> Result<(), RenderError> {
        if self.current_bindings == Some(bindings) {
            stats.bindings_elided += 1;
            return Ok(());
        }
        device.apply_bindings(&bindings)?;
        self.current_bindings = Some(bindings);
        stats.binding_changes += 1;
        Ok(())
    }

    fn draw_mesh(
        &mut self,
        device: &mut dyn GraphicsDevice,
        draw: &MeshDraw<'_>,
        stats: &mut RenderStats,
    ) -> Result<(), RenderError> {
        let object = ObjectUniforms {
            model: draw.submission.transform.into(),
            tint: draw.submission.tint,
        };
        device.apply_uniforms(UniformSlot::Object, bytemuck::bytes_of(&object))?;
        self.draw(device, 0, draw.mesh.index_count, 1, stats)
    }

    fn draw(
        &mut self,
        device: &mut dyn GraphicsDevice,
        base_element: u32,
        element_count: u32,
        instances: u32,
        stats: &mut RenderStats,
    ) -> Result<(), RenderError> {
        device.draw(base_element, element_count, instances)?;
        stats.draw_calls += 1;
        Ok(())
    }
}

/// Resolve submissions to meshes, skipping models whose asset is missing
fn resolve_meshes<'a>(frame: &'a FrameSubmissions, assets: &'a AssetManager, stats: &mut RenderStats) -> Vec<MeshDraw<'a>> {
    let mut draws = Vec::with_capacity(frame.models.len());
    for submission in &frame.models {
        let Some(model) = assets.get_model_data(submission.model) else {
            log::warn!("skipping draw of missing model {:?}", submission.model);
            stats.models_skipped += 1;
            continue;
        };
        draws.extend(model.meshes.iter().map(|mesh| MeshDraw { submission, mesh }));
    }
    draws
}

fn shadow_direction(lights: &[LightData]) -> Vec3 {
    lights
        .iter()
        .find(|light| light.light_type == LightType::Directional && light.cast_shadows)
        .map_or_else(|| Vec3::from(FALLBACK_SHADOW_DIRECTION), |light| light.direction)
}

/// World-to-light-clip matrix of a directional light, centered on `focus`
pub fn light_space_matrix(direction: Vec3, focus: Vec3, extent: f32) -> Mat4 {
    let direction = direction.try_normalize(1e-6).unwrap_or_else(|| -Vec3::y());
    let eye = focus - direction * (extent * 2.0);
    let view = Mat4::look_at(eye, focus, Vec3::y());
    let projection = Mat4::orthographic(-extent, extent, -extent, extent, 0.0, extent * 4.0);
    projection * view
}

/// Persistent sprites arrive sorted; transient ones are sorted and merged in
fn merge_sprites(mut persistent: Vec<Sprite>, mut transient: Vec<Sprite>) -> Vec<Sprite> {
    if transient.is_empty() {
        return persistent;
    }
    persistent.append(&mut transient);
    persistent.sort_by(sprite_order);
    persistent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ModelId;
    use crate::foundation::math::{Vec2, Vec4};
    use crate::render::device::{GpuCommand, RecordingDevice};
    use crate::render::scene::SkyboxSubmission;
    use approx::assert_relative_eq;

    fn render(scene: &SceneAssembly, assets: &AssetManager) -> (RenderStats, Vec<GpuCommand>) {
        let mut device = RecordingDevice::new();
        let probe = device.clone();
        let mut renderer = RenderManager::default();
        let stats = renderer.render_frame(scene, assets, &mut device).unwrap();
        (stats, probe.last_frame())
    }

    fn pass_targets(commands: &[GpuCommand]) -> Vec<RenderTarget> {
        commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::BeginPass(pass) => Some(pass.target),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_pass_order() {
        let assets = AssetManager::new();
        let scene = SceneAssembly::default();
        scene.add_model_to_scene(ModelSubmission::new(assets.cube(), Mat4::identity()));
        scene
            .draw_skybox_this_frame(SkyboxSubmission {
                texture: TextureHandle(9),
                intensity: 1.0,
            })
            .unwrap();
        scene.add_sprite_this_frame(Sprite::new(TextureHandle(4), Vec2::new(10.0, 10.0), Vec2::new(8.0, 8.0)));

        let (_, commands) = render(&scene, &assets);

        assert_eq!(
            pass_targets(&commands),
            vec![
                RenderTarget::ShadowMap,
                RenderTarget::Offscreen,
                RenderTarget::Offscreen,
                RenderTarget::Offscreen,
                RenderTarget::Swapchain,
            ]
        );
        assert!(scene.is_frame_empty());
    }

    #[test]
    fn test_light_block_applied_once_per_frame() {
        let assets = AssetManager::new();
        let scene = SceneAssembly::default();
        for x in 0..3 {
            scene.add_model_to_scene(ModelSubmission::new(
                assets.cube(),
                Mat4::new_translation(&Vec3::new(x as f32, 0.0, 0.0)),
            ));
        }
        scene
            .add_light_this_frame(LightData::directional(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0))
            .unwrap();

        let (stats, commands) = render(&scene, &assets);

        let light_uploads = commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::ApplyUniforms { slot: UniformSlot::Lights, .. }))
            .count();
        assert_eq!(light_uploads, 1);
        assert_eq!(stats.lights, 1);
        assert_eq!(stats.models_drawn, 3);
        // 3 shadow draws, 3 main draws, 1 blit
        assert_eq!(stats.draw_calls, 7);
    }

    #[test]
    fn test_identical_bindings_are_elided() {
        let assets = AssetManager::new();
        let scene = SceneAssembly::default();
        scene.add_model_to_scene(ModelSubmission::new(assets.cube(), Mat4::identity()));
        scene.add_model_to_scene(ModelSubmission::new(assets.cube(), Mat4::new_scaling(2.0)));

        let (stats, commands) = render(&scene, &assets);

        // One binding per pass for the cube (shadow, main), one for the blit
        assert_eq!(stats.binding_changes, 3);
        assert_eq!(stats.bindings_elided, 2);
        let bindings = commands
            .iter()
            .filter(|command| matches!(command, GpuCommand::ApplyBindings(_)))
            .count();
        assert_eq!(bindings, 3);
    }

    #[test]
    fn test_missing_model_is_skipped() {
        let assets = AssetManager::new();
        let scene = SceneAssembly::default();
        scene.add_model_to_scene(ModelSubmission::new(ModelId(999), Mat4::identity()));

        let (stats, _) = render(&scene, &assets);

        assert_eq!(stats.models_skipped, 1);
        assert_eq!(stats.models_drawn, 0);
        assert_eq!(stats.draw_calls, 1);
    }

    #[test]
    fn test_sprites_batched_by_texture_and_blend() {
        let assets = AssetManager::new();
        let scene = SceneAssembly::default();
        let size = Vec2::new(8.0, 8.0);
        for depth in [1.0, 2.0, 3.0] {
            scene
                .add_sprite_to_scene(Sprite::new(TextureHandle(1), Vec2::zeros(), size).with_depth(depth))
                .unwrap();
        }
        scene.add_sprite_this_frame(Sprite::new(TextureHandle(2), Vec2::zeros(), size).with_alpha());
        scene.add_sprite_this_frame(Sprite::new(TextureHandle(1), Vec2::zeros(), size).with_depth(0.5));

        let (stats, commands) = render(&scene, &assets);

        assert_eq!(stats.sprite_batches, 2);
        assert_eq!(stats.sprites, 5);
        let instanced: Vec<u32> = commands
            .iter()
            .filter_map(|command| match command {
                GpuCommand::Draw { instances, .. } if *instances > 1 => Some(*instances),
                _ => None,
            })
            .collect();
        assert_eq!(instanced, vec![4]);

        // Persistent sprites survive the frame
        assert_eq!(scene.scene_sprite_count(), 3);
    }

    #[test]
    fn test_light_space_centers_focus() {
        let focus = Vec3::new(3.0, 0.0, -2.0);
        let matrix = light_space_matrix(Vec3::new(0.0, -1.0, 0.0), focus, 10.0);

        let clip = matrix * Vec4::new(focus.x, focus.y, focus.z, 1.0);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-4);
        assert!(clip.z > 0.0 && clip.z < 1.0);
    }
}
