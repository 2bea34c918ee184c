//! Render queue and draw systems
//!
//! Queue systems only read components and submit into the scene assembly,
//! which locks each kind of submission separately; they share one wave of the
//! render-queue phase. The draw system owns the device and runs alone.

use super::camera::{Camera, CameraData};
use super::components::{ModelComponent, SkyboxComponent, SpriteComponent};
use super::device::GraphicsDevice;
use super::lighting::{LightComponent, LightData};
use super::renderer::{RenderManager, RenderStats};
use super::scene::{ModelSubmission, SkyboxSubmission};
use crate::assets::AssetManager;
use crate::ecs::components::{Transform2DComponent, TransformComponent};
use crate::ecs::{hierarchy, EcsError, FrameContext, System, SystemAccess, SystemError};
use crate::foundation::math::{Mat4, Transform, Transform2D};

/// Submits the first active camera (render-queue)
#[derive(Debug, Default)]
pub struct CameraQueueSystem;

impl CameraQueueSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for CameraQueueSystem {
    fn name(&self) -> &str {
        "camera_queue"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<Camera>().reads::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let cameras = ctx.world.read::<Camera>();
        let transforms = ctx.world.read::<TransformComponent>();

        let mut active = cameras.iter().filter(|(_, camera)| camera.active);
        if let Some((entity, camera)) = active.next() {
            let world = if transforms.contains(entity) {
                hierarchy::try_calculate_world_transform(&transforms, entity)?
            } else {
                Transform::identity()
            };
            ctx.scene.set_camera(CameraData::from_world(camera, &world));
        }
        if active.next().is_some() {
            log::warn!("several active cameras; rendering with the first");
        }
        Ok(())
    }
}

/// Resolves enabled lights to world space and queues them (render-queue)
#[derive(Debug, Default)]
pub struct LightQueueSystem;

impl LightQueueSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for LightQueueSystem {
    fn name(&self) -> &str {
        "light_queue"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<LightComponent>().reads::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let lights = ctx.world.read::<LightComponent>();
        let transforms = ctx.world.read::<TransformComponent>();

        for (entity, light) in lights.iter().filter(|(_, light)| light.enabled) {
            let world = if transforms.contains(entity) {
                hierarchy::try_calculate_world_transform(&transforms, entity)?
            } else {
                Transform::identity()
            };

            ctx.scene.add_light_this_frame(LightData {
                light_type: light.light_type,
                position: world.translation,
                direction: world.transform_vector(&light.direction),
                color: light.color,
                intensity: light.intensity,
                range: light.range,
                inner_cone: light.inner_cone,
                outer_cone: light.outer_cone,
                cast_shadows: light.cast_shadows,
            })?;
        }
        Ok(())
    }
}

/// Queues visible models at their world transform (render-queue)
#[derive(Debug, Default)]
pub struct ModelQueueSystem;

impl ModelQueueSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for ModelQueueSystem {
    fn name(&self) -> &str {
        "model_queue"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<ModelComponent>().reads::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let models = ctx.world.read::<ModelComponent>();
        let transforms = ctx.world.read::<TransformComponent>();

        for (entity, model) in models.iter().filter(|(_, model)| model.visible) {
            let world = if transforms.contains(entity) {
                hierarchy::try_calculate_world_transform(&transforms, entity)?
            } else {
                Transform::identity()
            };

            ctx.scene.add_model_to_scene(ModelSubmission {
                model: model.model,
                transform: world.to_matrix() * Mat4::new_nonuniform_scaling(&model.scale),
                tint: model.tint,
                cast_shadows: model.cast_shadows,
            });
        }
        Ok(())
    }
}

/// Queues the enabled skybox (render-queue)
#[derive(Debug, Default)]
pub struct SkyboxQueueSystem;

impl SkyboxQueueSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for SkyboxQueueSystem {
    fn name(&self) -> &str {
        "skybox_queue"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<SkyboxComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let skyboxes = ctx.world.read::<SkyboxComponent>();
        for (_, skybox) in skyboxes.iter().filter(|(_, skybox)| skybox.enabled) {
            ctx.scene.draw_skybox_this_frame(SkyboxSubmission {
                texture: skybox.texture,
                intensity: skybox.intensity,
            })?;
        }
        Ok(())
    }
}

/// Queues visible sprite components at their 2D world transform (render-queue)
#[derive(Debug, Default)]
pub struct SpriteQueueSystem;

impl SpriteQueueSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for SpriteQueueSystem {
    fn name(&self) -> &str {
        "sprite_queue"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().reads::<SpriteComponent>().reads::<Transform2DComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let sprites = ctx.world.read::<SpriteComponent>();
        let transforms = ctx.world.read::<Transform2DComponent>();

        for (entity, component) in sprites.iter().filter(|(_, component)| component.visible) {
            let world = if transforms.contains(entity) {
                hierarchy::try_calculate_world_transform(&transforms, entity)?
            } else {
                Transform2D::identity()
            };

            let mut sprite = component.sprite;
            sprite.position = world.transform_point(&component.sprite.position);
            sprite.rotation += world.rotation;
            ctx.scene.add_sprite_this_frame(sprite);
        }
        Ok(())
    }
}

/// Renders the assembled scene through the owned device (render-draw)
///
/// Publishes the [`RenderStats`] of the last frame as a world resource.
pub struct RenderDrawSystem {
    renderer: RenderManager,
    device: Box<dyn GraphicsDevice>,
}

impl std::fmt::Debug for RenderDrawSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDrawSystem")
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl RenderDrawSystem {
    /// Create the system
    pub fn new(renderer: RenderManager, device: Box<dyn GraphicsDevice>) -> Self {
        Self { renderer, device }
    }
}

impl System for RenderDrawSystem {
    fn name(&self) -> &str {
        "render_draw"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<AssetManager>()
            .writes::<RenderStats>()
            .serial()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let stats = {
            let assets = ctx
                .world
                .resource::<AssetManager>()
                .ok_or(EcsError::MissingResource("AssetManager"))?;
            self.renderer.render_frame(&ctx.scene, &assets, self.device.as_mut())?
        };
        ctx.world.insert_resource(stats);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use crate::foundation::math::{Quat, Vec2, Vec3};
    use crate::foundation::time::FrameTime;
    use crate::input::InputSnapshot;
    use crate::render::device::TextureHandle;
    use crate::render::SceneAssembly;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn context(world: &Arc<World>, scene: &Arc<SceneAssembly>) -> FrameContext {
        FrameContext::new(world.clone(), scene.clone(), FrameTime::default(), InputSnapshot::default())
    }

    #[test]
    fn test_light_follows_parent() {
        let world = Arc::new(World::new());
        let scene = Arc::new(SceneAssembly::default());

        let parent = world.spawn();
        world
            .insert(
                parent,
                TransformComponent::from_position_rotation(
                    Vec3::new(0.0, 5.0, 0.0),
                    Quat::from_axis_angle(&Vec3::x_axis(), std::f32::consts::FRAC_PI_2),
                ),
            )
            .unwrap();
        let lamp = world.spawn();
        world
            .insert(lamp, TransformComponent::from_position(Vec3::new(1.0, 0.0, 0.0)).with_parent(parent))
            .unwrap();
        world
            .insert(lamp, LightComponent::spot(Vec3::new(0.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 1.0), 1.0, 10.0, 0.2, 0.4))
            .unwrap();

        LightQueueSystem::new().run(&context(&world, &scene)).unwrap();

        let lights = scene.lights();
        assert_eq!(lights.len(), 1);
        assert_relative_eq!(lights[0].position, Vec3::new(1.0, 5.0, 0.0), epsilon = 1e-5);
        // -Z rotated a quarter turn around +X points down +Y
        assert_relative_eq!(lights[0].direction, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_disabled_light_not_queued() {
        let world = Arc::new(World::new());
        let scene = Arc::new(SceneAssembly::default());
        let lamp = world.spawn();
        let mut light = LightComponent::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 3.0);
        light.enabled = false;
        world.insert(lamp, light).unwrap();

        LightQueueSystem::new().run(&context(&world, &scene)).unwrap();

        assert!(scene.lights().is_empty());
    }

    #[test]
    fn test_light_budget_error_fails_system() {
        let world = Arc::new(World::new());
        let scene = Arc::new(SceneAssembly::new(1, 16));
        for _ in 0..2 {
            let lamp = world.spawn();
            world.insert(lamp, LightComponent::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 3.0)).unwrap();
        }

        let result = LightQueueSystem::new().run(&context(&world, &scene));

        assert!(matches!(result, Err(SystemError::Scene(_))));
    }

    #[test]
    fn test_model_submission_applies_scale() {
        let world = Arc::new(World::new());
        let scene = Arc::new(SceneAssembly::default());
        let entity = world.spawn();
        world.insert(entity, TransformComponent::from_position(Vec3::new(2.0, 0.0, 0.0))).unwrap();
        world
            .insert(entity, ModelComponent::new(crate::assets::ModelId(0)).with_scale(Vec3::new(3.0, 3.0, 3.0)))
            .unwrap();

        ModelQueueSystem::new().run(&context(&world, &scene)).unwrap();

        let models = scene.models();
        assert_eq!(models.len(), 1);
        assert_relative_eq!(models[0].transform[(0, 0)], 3.0);
        assert_relative_eq!(models[0].transform[(0, 3)], 2.0);
    }

    #[test]
    fn test_sprite_component_uses_2d_hierarchy() {
        let world = Arc::new(World::new());
        let scene = Arc::new(SceneAssembly::default());
        let table = world.spawn();
        world
            .insert(table, Transform2DComponent::from_position(Vec2::new(100.0, 50.0)))
            .unwrap();
        let card = world.spawn();
        world
            .insert(card, Transform2DComponent::from_position(Vec2::new(10.0, 0.0)).with_parent(table))
            .unwrap();
        world.insert(card, SpriteComponent::new(TextureHandle(2), Vec2::new(32.0, 48.0))).unwrap();

        SpriteQueueSystem::new().run(&context(&world, &scene)).unwrap();

        let sprites = scene.frame_sprites();
        assert_eq!(sprites.len(), 1);
        assert_relative_eq!(sprites[0].position, Vec2::new(110.0, 50.0));
    }
}
