//! Scene assembly
//!
//! [`SceneAssembly`] collects everything the renderer draws in a frame.
//! Queue systems submit models, lights, a skybox and transient sprites during
//! the render-queue phase; the draw system consumes the submissions during
//! the render-draw phase, which empties the per-frame buffers. Each buffer
//! has its own lock, so queue systems touching different kinds of
//! submissions run in parallel. Persistent sprites live in the sprite
//! registry until erased.

use super::camera::CameraData;
use super::device::TextureHandle;
use super::lighting::{LightData, MAX_LIGHTS};
use super::sprite_registry::{Sprite, SpriteSceneData, SpriteSceneId};
use crate::assets::ModelId;
use crate::foundation::math::{Mat4, Vec3};
use parking_lot::Mutex;

/// Errors raised while assembling a frame
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// More lights were queued than the per-frame budget allows
    #[error("light budget exceeded: at most {max} lights per frame")]
    LightBudgetExceeded {
        /// Configured budget
        max: usize,
    },

    /// A second skybox was queued in the same frame
    #[error("a skybox is already queued this frame")]
    SkyboxAlreadyQueued,

    /// The persistent sprite registry is at capacity
    #[error("sprite registry full ({capacity} sprites)")]
    SpriteRegistryFull {
        /// Registry capacity
        capacity: usize,
    },

    /// The sprite id does not name a registered sprite
    #[error("unknown sprite {0:?}")]
    UnknownSprite(SpriteSceneId),
}

/// A model instance to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSubmission {
    /// Model asset
    pub model: ModelId,
    /// World matrix, scale included
    pub transform: Mat4,
    /// RGBA color multiplier
    pub tint: [f32; 4],
    /// Whether the model is drawn into the shadow map
    pub cast_shadows: bool,
}

impl ModelSubmission {
    /// Untinted, shadow-casting submission
    pub fn new(model: ModelId, transform: Mat4) -> Self {
        Self {
            model,
            transform,
            tint: [1.0; 4],
            cast_shadows: true,
        }
    }
}

/// The skybox to draw this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyboxSubmission {
    /// Cube map texture
    pub texture: TextureHandle,
    /// Brightness multiplier
    pub intensity: f32,
}

/// Ambient term of the light block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    /// RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 0.15,
        }
    }
}

/// Submissions of one frame, taken out of the assembly by the renderer
#[derive(Debug, Clone, Default)]
pub struct FrameSubmissions {
    /// Models in submission order
    pub models: Vec<ModelSubmission>,
    /// Lights in submission order
    pub lights: Vec<LightData>,
    /// Skybox, if any
    pub skybox: Option<SkyboxSubmission>,
    /// Transient sprites in submission order
    pub sprites: Vec<Sprite>,
}

/// Per-frame render submissions plus persistent sprites
#[derive(Debug)]
pub struct SceneAssembly {
    max_lights: usize,
    models: Mutex<Vec<ModelSubmission>>,
    lights: Mutex<Vec<LightData>>,
    skybox: Mutex<Option<SkyboxSubmission>>,
    sprites: Mutex<Vec<Sprite>>,
    camera: Mutex<Option<CameraData>>,
    ambient: Mutex<AmbientLight>,
    sprite_registry: Mutex<SpriteSceneData>,
}

impl Default for SceneAssembly {
    fn default() -> Self {
        Self::new(MAX_LIGHTS, 1024)
    }
}

impl SceneAssembly {
    /// Create an assembly with the given light budget and sprite registry capacity
    pub fn new(max_lights: usize, max_scene_sprites: usize) -> Self {
        Self {
            max_lights: max_lights.min(MAX_LIGHTS),
            models: Mutex::new(Vec::new()),
            lights: Mutex::new(Vec::with_capacity(MAX_LIGHTS)),
            skybox: Mutex::new(None),
            sprites: Mutex::new(Vec::new()),
            camera: Mutex::new(None),
            ambient: Mutex::new(AmbientLight::default()),
            sprite_registry: Mutex::new(SpriteSceneData::with_capacity(max_scene_sprites)),
        }
    }

    /// Per-frame light budget
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Queue a model for this frame
    pub fn add_model_to_scene(&self, model: ModelSubmission) {
        self.models.lock().push(model);
    }

    /// Queue a light for this frame
    pub fn add_light_this_frame(&self, light: LightData) -> Result<(), SceneError> {
        let mut lights = self.lights.lock();
        if lights.len() >= self.max_lights {
            log::error!("dropping {:?} light: budget of {} reached", light.light_type, self.max_lights);
            return Err(SceneError::LightBudgetExceeded { max: self.max_lights });
        }
        lights.push(light);
        Ok(())
    }

    /// Queue the skybox for this frame; at most one per frame
    pub fn draw_skybox_this_frame(&self, skybox: SkyboxSubmission) -> Result<(), SceneError> {
        let mut slot = self.skybox.lock();
        if slot.is_some() {
            log::error!("skybox queued twice in one frame");
            return Err(SceneError::SkyboxAlreadyQueued);
        }
        *slot = Some(skybox);
        Ok(())
    }

    /// Queue a transient sprite for this frame
    pub fn add_sprite_this_frame(&self, sprite: Sprite) {
        self.sprites.lock().push(sprite);
    }

    /// Set the camera used by subsequent frames
    pub fn set_camera(&self, camera: CameraData) {
        *self.camera.lock() = Some(camera);
    }

    /// Camera of the scene, if one was set
    pub fn camera(&self) -> Option<CameraData> {
        *self.camera.lock()
    }

    /// Set the ambient light term
    pub fn set_ambient(&self, ambient: AmbientLight) {
        *self.ambient.lock() = ambient;
    }

    /// Ambient light term
    pub fn ambient(&self) -> AmbientLight {
        *self.ambient.lock()
    }

    /// Register a persistent sprite
    pub fn add_sprite_to_scene(&self, sprite: Sprite) -> Result<SpriteSceneId, SceneError> {
        self.sprite_registry.lock().add(sprite)
    }

    /// Replace a persistent sprite
    pub fn update_sprite_in_scene(&self, id: SpriteSceneId, sprite: Sprite) -> Result<(), SceneError> {
        self.sprite_registry.lock().update(id, sprite)
    }

    /// Remove a persistent sprite
    pub fn erase_sprite_from_scene(&self, id: SpriteSceneId) -> Result<Sprite, SceneError> {
        self.sprite_registry.lock().erase(id)
    }

    /// Number of persistent sprites
    pub fn scene_sprite_count(&self) -> usize {
        self.sprite_registry.lock().len()
    }

    /// Run a closure with exclusive access to the sprite registry
    pub fn with_sprite_registry<R>(&self, f: impl FnOnce(&mut SpriteSceneData) -> R) -> R {
        f(&mut self.sprite_registry.lock())
    }

    /// Snapshot of the models queued so far
    pub fn models(&self) -> Vec<ModelSubmission> {
        self.models.lock().clone()
    }

    /// Snapshot of the lights queued so far
    pub fn lights(&self) -> Vec<LightData> {
        self.lights.lock().clone()
    }

    /// Skybox queued so far
    pub fn skybox(&self) -> Option<SkyboxSubmission> {
        *self.skybox.lock()
    }

    /// Snapshot of the transient sprites queued so far
    pub fn frame_sprites(&self) -> Vec<Sprite> {
        self.sprites.lock().clone()
    }

    /// Whether nothing is queued for this frame
    pub fn is_frame_empty(&self) -> bool {
        self.models.lock().is_empty()
            && self.lights.lock().is_empty()
            && self.skybox.lock().is_none()
            && self.sprites.lock().is_empty()
    }

    /// Take this frame's submissions, leaving the per-frame buffers empty
    pub fn take_frame(&self) -> FrameSubmissions {
        FrameSubmissions {
            models: std::mem::take(&mut *self.models.lock()),
            lights: std::mem::take(&mut *self.lights.lock()),
            skybox: self.skybox.lock().take(),
            sprites: std::mem::take(&mut *self.sprites.lock()),
        }
    }

    /// Drop this frame's submissions
    pub fn clear_frame(&self) {
        drop(self.take_frame());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;

    #[test]
    fn test_light_budget() {
        let scene = SceneAssembly::new(2, 16);
        let light = LightData::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0);

        scene.add_light_this_frame(light).unwrap();
        scene.add_light_this_frame(light).unwrap();

        assert_eq!(scene.add_light_this_frame(light), Err(SceneError::LightBudgetExceeded { max: 2 }));
        assert_eq!(scene.lights().len(), 2);
    }

    #[test]
    fn test_light_budget_capped_at_block_size() {
        let scene = SceneAssembly::new(100, 16);
        assert_eq!(scene.max_lights(), MAX_LIGHTS);
    }

    #[test]
    fn test_single_skybox_per_frame() {
        let scene = SceneAssembly::default();
        let skybox = SkyboxSubmission {
            texture: TextureHandle(3),
            intensity: 1.0,
        };

        scene.draw_skybox_this_frame(skybox).unwrap();
        assert_eq!(scene.draw_skybox_this_frame(skybox), Err(SceneError::SkyboxAlreadyQueued));

        scene.clear_frame();
        assert!(scene.draw_skybox_this_frame(skybox).is_ok());
    }

    #[test]
    fn test_take_frame_empties_buffers_but_keeps_persistent_state() {
        let scene = SceneAssembly::default();
        let sprite = Sprite::new(TextureHandle(1), Vec2::zeros(), Vec2::new(8.0, 8.0));

        scene.add_model_to_scene(ModelSubmission::new(ModelId(0), Mat4::identity()));
        scene.add_sprite_this_frame(sprite);
        scene.add_sprite_to_scene(sprite).unwrap();
        scene.set_camera(CameraData::default());

        let frame = scene.take_frame();

        assert_eq!(frame.models.len(), 1);
        assert_eq!(frame.sprites.len(), 1);
        assert!(scene.is_frame_empty());
        assert_eq!(scene.scene_sprite_count(), 1);
        assert!(scene.camera().is_some());
    }
}
