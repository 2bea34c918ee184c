//! Scene setup
//!
//! Each scene spawns its entities, loads what assets it can find and
//! registers its systems. Missing art or music is not fatal: the card atlas
//! falls back to the white texture, and the scene plays without sound.

use crate::components::{CameraRig, Flicker, PlayerController, Spinner};
use crate::config::GameConfig;
use crate::game::GinRummy;
use crate::systems;
use crate::table::{CardTable, TableLayout};
use hearth_engine::assets::{AssetManager, ModelId};
use hearth_engine::audio::MusicPlayer;
use hearth_engine::ecs::components::TransformComponent;
use hearth_engine::ecs::{Component, Entity, World};
use hearth_engine::foundation::math::{Quat, Vec3};
use hearth_engine::physics::{BodyDesc, CharacterController, RigidBodyDescriptor, Shape};
use hearth_engine::render::{Camera, LightComponent, ModelComponent, SkyboxComponent, TextureHandle};
use hearth_engine::{AppError, Engine};

const CARD_ATLAS: &str = "assets/textures/cards.png";
const TABLE_MUSIC: &str = "assets/audio/card_table.ogg";
const SKYBOX: &str = "assets/textures/sky.png";

const FELT: [f32; 4] = [0.08, 0.35, 0.18, 1.0];
const LAMP_COLOR: [f32; 3] = [1.0, 0.85, 0.6];

/// Entities of the cube test scene
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeScene {
    /// Entity owning the physics world
    pub physics: Entity,
    /// Player capsule
    pub player: Entity,
    /// Camera riding the player
    pub camera: Entity,
}

fn insert<T: Component>(world: &World, entity: Entity, component: T) -> Result<(), AppError> {
    world
        .insert(entity, component)
        .map(|_| ())
        .map_err(|e| AppError::Custom(format!("scene setup: {e}")))
}

fn cube_model(world: &World) -> Result<ModelId, AppError> {
    world
        .resource::<AssetManager>()
        .map(|assets| assets.cube())
        .ok_or_else(|| AppError::Custom("no asset manager".to_string()))
}

fn load_texture_or_white(world: &World, path: &str) -> TextureHandle {
    let Some(mut assets) = world.resource_mut::<AssetManager>() else {
        return TextureHandle::WHITE;
    };
    assets.load_texture(path).unwrap_or_else(|e| {
        log::warn!("{e}; drawing with the white texture");
        TextureHandle::WHITE
    })
}

fn play_music(world: &World, path: &str) {
    let (Some(mut assets), Some(mut music)) = (world.resource_mut::<AssetManager>(), world.resource_mut::<MusicPlayer>())
    else {
        return;
    };
    let played = assets
        .load_audio(path)
        .map_err(|e| e.to_string())
        .and_then(|clip| music.play_music(&assets, clip).map_err(|e| e.to_string()));
    match played {
        Ok(_) => log::info!("playing {path}"),
        Err(error) => log::warn!("no music: {error}"),
    }
}

fn spawn_camera(engine: &Engine, transform: TransformComponent) -> Result<Entity, AppError> {
    let world = engine.world();
    let camera = world.spawn();
    insert(world, camera, transform)?;
    insert(
        world,
        camera,
        Camera {
            aspect: engine.config().window.aspect_ratio(),
            ..Camera::default()
        },
    )?;
    Ok(camera)
}

/// Gin rummy against the computer
pub fn setup_card_table(engine: &mut Engine, config: &GameConfig) -> Result<(), AppError> {
    log::info!("Setting up card table...");
    let world = std::sync::Arc::clone(engine.world());
    let cube = cube_model(&world)?;

    let eye = Vec3::new(0.0, 6.0, 4.0);
    spawn_camera(engine, TransformComponent::from_position_rotation(eye, Quat::face_towards(&eye, &Vec3::y())))?;

    let felt = world.spawn();
    insert(&world, felt, TransformComponent::from_position(Vec3::new(0.0, -0.1, 0.0)))?;
    insert(&world, felt, ModelComponent::new(cube).with_scale(Vec3::new(8.0, 0.2, 5.0)).with_tint(FELT))?;

    let lamp = world.spawn();
    let [r, g, b] = LAMP_COLOR;
    insert(&world, lamp, TransformComponent::from_position(Vec3::new(0.0, 3.0, 0.0)))?;
    insert(&world, lamp, LightComponent::point(Vec3::new(r, g, b), 3.0, 12.0))?;
    insert(&world, lamp, Flicker::new(3.0, 0.4, 1.7))?;

    let texture = load_texture_or_white(&world, CARD_ATLAS);
    let mut table = CardTable::new(
        GinRummy::new(config.rules(), config.seed),
        TableLayout::from_window(&engine.config().window),
        texture,
        config,
    );
    table
        .sync_sprites(engine.scene())
        .map_err(|e| AppError::Custom(format!("card sprites: {e}")))?;
    world.insert_resource(table);

    play_music(&world, TABLE_MUSIC);
    systems::add_card_table_systems(engine.scheduler_mut());
    log::info!("Card table ready ({} sprites)", engine.scene().scene_sprite_count());
    Ok(())
}

/// Physics playground: a floor, spinning and falling cubes, and a walkable capsule
pub fn setup_cube_scene(engine: &mut Engine) -> Result<CubeScene, AppError> {
    log::info!("Setting up cube scene...");
    let physics = engine.create_physics_world()?;
    let world = std::sync::Arc::clone(engine.world());
    let cube = cube_model(&world)?;

    let floor = world.spawn();
    insert(&world, floor, TransformComponent::from_position(Vec3::new(0.0, -0.5, 0.0)))?;
    insert(&world, floor, ModelComponent::new(cube).with_scale(Vec3::new(40.0, 1.0, 40.0)))?;
    insert(
        &world,
        floor,
        RigidBodyDescriptor::new(
            physics,
            BodyDesc::fixed(Shape::Box {
                half_extents: Vec3::new(20.0, 0.5, 20.0),
            }),
        ),
    )?;

    for (index, axis) in [Vec3::y(), Vec3::x(), Vec3::new(1.0, 1.0, 0.0)].into_iter().enumerate() {
        let spinner = world.spawn();
        let x = index as f32 * 3.0 - 3.0;
        insert(&world, spinner, TransformComponent::from_position(Vec3::new(x, 2.0, -6.0)))?;
        insert(&world, spinner, ModelComponent::new(cube).with_tint([0.8, 0.3 + 0.2 * index as f32, 0.2, 1.0]))?;
        insert(&world, spinner, Spinner::new(axis, 1.0 + index as f32 * 0.5))?;
    }

    for index in 0..4 {
        let crate_box = world.spawn();
        let height = 4.0 + index as f32 * 1.5;
        insert(
            &world,
            crate_box,
            TransformComponent::from_position(Vec3::new(2.0 + 0.3 * index as f32, height, -2.0)),
        )?;
        insert(&world, crate_box, ModelComponent::new(cube).with_tint([0.6, 0.5, 0.3, 1.0]))?;
        insert(
            &world,
            crate_box,
            RigidBodyDescriptor::new(
                physics,
                BodyDesc::dynamic(
                    Shape::Box {
                        half_extents: Vec3::new(0.5, 0.5, 0.5),
                    },
                    10.0,
                )
                .with_restitution(0.2),
            ),
        )?;
    }

    let player = world.spawn();
    insert(&world, player, TransformComponent::from_position(Vec3::new(0.0, 1.0, 4.0)))?;
    insert(&world, player, CharacterController::new(physics))?;
    insert(&world, player, PlayerController::default())?;

    let camera = spawn_camera(engine, TransformComponent::identity().with_parent(player))?;
    insert(&world, camera, CameraRig::first_person(0.7))?;

    let sun = world.spawn();
    insert(&world, sun, TransformComponent::identity())?;
    insert(
        &world,
        sun,
        LightComponent::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::new(1.0, 0.97, 0.9), 1.2),
    )?;

    let lamp = world.spawn();
    insert(&world, lamp, TransformComponent::from_position(Vec3::new(-4.0, 2.5, -2.0)))?;
    insert(&world, lamp, LightComponent::point(Vec3::new(1.0, 0.6, 0.3), 2.0, 8.0))?;
    insert(&world, lamp, Flicker::new(2.0, 0.6, 2.3).with_phase(0.8))?;

    let sky = load_texture_or_white(&world, SKYBOX);
    if sky != TextureHandle::WHITE {
        let skybox = world.spawn();
        insert(&world, skybox, SkyboxComponent::new(sky))?;
    }

    systems::add_cube_scene_systems(engine.scheduler_mut());
    log::info!("Cube scene ready");
    Ok(CubeScene { physics, player, camera })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CardTable;
    use hearth_engine::ecs::hierarchy;
    use hearth_engine::physics::{CharacterControllerState, RigidBody};
    use hearth_engine::render::RecordingDevice;
    use hearth_engine::EngineConfig;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default().with_worker_threads(2), Box::new(RecordingDevice::new())).unwrap()
    }

    #[test]
    fn test_card_table_plays_frames() {
        let mut engine = engine();
        let config = GameConfig {
            autoplay: true,
            ..GameConfig::default()
        };
        setup_card_table(&mut engine, &config).unwrap();
        assert_eq!(engine.scene().scene_sprite_count(), 52);

        for _ in 0..120 {
            engine.tick(1.0 / 30.0).unwrap();
        }
        let table = engine.world().resource::<CardTable>().unwrap();
        assert!(table.game().hand(crate::game::Seat::North).len() >= 10);
        assert_eq!(engine.failed_frames(), 0);
    }

    #[test]
    fn test_player_falls_onto_the_floor() {
        let mut engine = engine();
        let scene = setup_cube_scene(&mut engine).unwrap();

        for _ in 0..180 {
            engine.tick(1.0 / 60.0).unwrap();
        }
        let world = engine.world();
        assert!(world.has::<RigidBody>(scene.player));
        assert!(world.has::<CharacterControllerState>(scene.player));

        let transforms = world.read::<TransformComponent>();
        let player = hierarchy::try_calculate_world_transform(&transforms, scene.player).unwrap();
        assert!(player.translation.y > 0.0 && player.translation.y < 2.0);

        let eye = hierarchy::try_calculate_world_transform(&transforms, scene.camera).unwrap();
        assert!(eye.translation.y > player.translation.y);
    }
}
