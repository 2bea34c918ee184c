//! Whole-frame scenarios driven through the engine

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use hearth_engine::ecs::components::TransformComponent;
use hearth_engine::ecs::{Entity, FnSystem, FrameContext, Phase, SystemAccess};
use hearth_engine::foundation::math::{Vec2, Vec3};
use hearth_engine::physics::{
    BodyDesc, CharacterController, CharacterControllerState, PhysicsWorld, RigidBody, RigidBodyDescriptor, Shape,
};
use hearth_engine::render::{
    Camera, GpuCommand, LightComponent, ModelComponent, RecordingDevice, Sprite, TextureHandle,
};
use hearth_engine::{Engine, EngineConfig};
use parking_lot::Mutex;

const DT: f32 = 0.016;

fn engine() -> (Engine, RecordingDevice) {
    let device = RecordingDevice::new();
    let config = EngineConfig::new().with_worker_threads(4).with_log_level("warn");
    let engine = Engine::new(config, Box::new(device.clone())).unwrap();
    (engine, device)
}

fn body_position(engine: &Engine, physics: Entity, entity: Entity) -> Vec3 {
    let body = engine.world().get_cloned::<RigidBody>(entity).unwrap();
    let worlds = engine.world().read::<PhysicsWorld>();
    worlds
        .get(physics)
        .unwrap()
        .backend()
        .body_transform(body.handle)
        .unwrap()
        .translation
}

#[test]
fn physics_phases_run_in_order() {
    let (mut engine, _) = engine();
    let order = Arc::new(Mutex::new(Vec::new()));

    for phase in [Phase::PhysicsOut, Phase::PhysicsIn, Phase::PhysicsStep] {
        let order = Arc::clone(&order);
        engine.scheduler_mut().add_system(
            phase,
            FnSystem::new(format!("probe_{phase}"), SystemAccess::new(), move |_ctx: &FrameContext| {
                order.lock().push(phase);
                Ok(())
            }),
        );
    }

    engine.tick(DT).unwrap();

    assert_eq!(*order.lock(), vec![Phase::PhysicsIn, Phase::PhysicsStep, Phase::PhysicsOut]);
    assert_eq!(engine.scheduler().current_phase(), None);
}

fn body_velocity(engine: &Engine, physics: Entity, entity: Entity) -> Vec3 {
    let body = engine.world().get_cloned::<RigidBody>(entity).unwrap();
    let worlds = engine.world().read::<PhysicsWorld>();
    worlds.get(physics).unwrap().backend().linear_velocity(body.handle).unwrap()
}

fn count_game_logic(engine: &mut Engine) -> Arc<AtomicUsize> {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    engine.scheduler_mut().add_system(
        Phase::GameLogic,
        FnSystem::new("game_logic_counter", SystemAccess::new(), move |_ctx: &FrameContext| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    runs
}

#[test]
fn kinematic_body_follows_its_transform() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let world = Arc::clone(engine.world());

    let platform = world.spawn();
    world.insert(platform, TransformComponent::identity()).unwrap();
    let shape = Shape::Box { half_extents: Vec3::new(1.0, 0.1, 1.0) };
    world.insert(platform, RigidBodyDescriptor::new(physics, BodyDesc::kinematic(shape))).unwrap();
    // Creates the body at the identity pose; the move below is picked up by
    // the physics-in phase of the following frame
    engine.tick(DT).unwrap();

    world.write::<TransformComponent>().get_mut(platform).unwrap().local.translation = Vec3::new(5.0, 0.0, 0.0);
    engine.tick(DT).unwrap();

    assert_relative_eq!(body_position(&engine, physics, platform), Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
    let local = world.get_cloned::<TransformComponent>(platform).unwrap().local;
    assert_relative_eq!(local.translation, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-5);
}

#[test]
fn kinematic_body_starts_at_its_world_pose() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let world = Arc::clone(engine.world());

    let platform = world.spawn();
    world.insert(platform, TransformComponent::from_position(Vec3::new(0.0, 2.0, -3.0))).unwrap();
    let shape = Shape::Box { half_extents: Vec3::new(1.0, 0.1, 1.0) };
    world.insert(platform, RigidBodyDescriptor::new(physics, BodyDesc::kinematic(shape))).unwrap();
    engine.tick(DT).unwrap();

    assert!(!world.has::<RigidBodyDescriptor>(platform));
    assert_relative_eq!(body_position(&engine, physics, platform), Vec3::new(0.0, 2.0, -3.0), epsilon = 1e-5);
}

#[test]
fn bad_body_requests_do_not_stall_frames() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let runs = count_game_logic(&mut engine);
    let world = Arc::clone(engine.world());
    let cube = Shape::Box { half_extents: Vec3::new(0.5, 0.5, 0.5) };

    // Names an entity that owns no physics world
    let not_a_world = world.spawn();
    let orphan = world.spawn();
    world.insert(orphan, TransformComponent::identity()).unwrap();
    world.insert(orphan, RigidBodyDescriptor::new(not_a_world, BodyDesc::fixed(cube))).unwrap();

    let weightless = world.spawn();
    world.insert(weightless, TransformComponent::identity()).unwrap();
    world.insert(weightless, RigidBodyDescriptor::new(physics, BodyDesc::dynamic(cube, 0.0))).unwrap();

    let good = world.spawn();
    world.insert(good, TransformComponent::from_position(Vec3::new(3.0, 0.0, 0.0))).unwrap();
    world.insert(good, RigidBodyDescriptor::new(physics, BodyDesc::fixed(cube))).unwrap();

    let lost_player = world.spawn();
    world.insert(lost_player, TransformComponent::identity()).unwrap();
    world.insert(lost_player, CharacterController::new(not_a_world)).unwrap();

    for _ in 0..5 {
        engine.tick(DT).unwrap();
    }

    assert_eq!(runs.load(Ordering::SeqCst), 5);
    assert_eq!(engine.failed_frames(), 0);
    for entity in [orphan, weightless, good] {
        assert!(!world.has::<RigidBodyDescriptor>(entity));
    }
    assert!(!world.has::<RigidBody>(orphan));
    assert!(!world.has::<RigidBody>(weightless));
    assert!(!world.has::<CharacterController>(lost_player));
    assert!(world.has::<RigidBody>(good));
    assert_eq!(world.read::<PhysicsWorld>().get(physics).unwrap().body_count(), 1);
}

#[test]
fn bad_replacement_keeps_the_existing_body() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let world = Arc::clone(engine.world());
    let cube = Shape::Box { half_extents: Vec3::new(0.5, 0.5, 0.5) };

    let wall = world.spawn();
    world.insert(wall, TransformComponent::identity()).unwrap();
    world.insert(wall, RigidBodyDescriptor::new(physics, BodyDesc::fixed(cube))).unwrap();
    engine.tick(DT).unwrap();
    let body = world.get_cloned::<RigidBody>(wall).unwrap();

    let not_a_world = world.spawn();
    world.insert(wall, RigidBodyDescriptor::new(not_a_world, BodyDesc::fixed(cube))).unwrap();
    engine.tick(DT).unwrap();

    assert!(!world.has::<RigidBodyDescriptor>(wall));
    assert_eq!(world.get_cloned::<RigidBody>(wall), Some(body));
    assert_eq!(world.read::<PhysicsWorld>().get(physics).unwrap().body_count(), 1);
}

#[test]
fn character_jumps_only_from_the_ground() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let world = Arc::clone(engine.world());

    // Floor top at y = 0.5; the capsule center sits 0.9 above its feet
    let floor = world.spawn();
    world.insert(floor, TransformComponent::identity()).unwrap();
    let slab = Shape::Box { half_extents: Vec3::new(10.0, 0.5, 10.0) };
    world.insert(floor, RigidBodyDescriptor::new(physics, BodyDesc::fixed(slab))).unwrap();

    let standing = 1.4;
    let player = world.spawn();
    world.insert(player, TransformComponent::from_position(Vec3::new(0.0, standing, 0.0))).unwrap();
    world.insert(player, CharacterController::new(physics)).unwrap();

    let height = || world.get_cloned::<TransformComponent>(player).unwrap().position().y;
    let request = |velocity: Vec3, jump: bool| {
        let mut states = world.write::<CharacterControllerState>();
        let state = states.get_mut(player).unwrap();
        state.desired_velocity = velocity;
        state.jump_requested = jump;
    };

    for _ in 0..10 {
        engine.tick(DT).unwrap();
    }
    let state = world.get_cloned::<CharacterControllerState>(player).unwrap();
    assert!(state.on_ground);
    assert_relative_eq!(height(), standing, epsilon = 0.02);

    // Walking applies the requested horizontal velocity
    request(Vec3::new(1.0, 0.0, 0.0), false);
    engine.tick(DT).unwrap();
    assert_relative_eq!(body_velocity(&engine, physics, player).x, 1.0, epsilon = 0.01);
    assert!(world.get_cloned::<TransformComponent>(player).unwrap().position().x > 0.0);

    request(Vec3::zeros(), true);
    engine.tick(DT).unwrap();
    let state = world.get_cloned::<CharacterControllerState>(player).unwrap();
    assert!(!state.jump_requested);
    assert!(body_velocity(&engine, physics, player).y > 4.0);

    let mut peak = height();
    for _ in 0..10 {
        engine.tick(DT).unwrap();
        peak = peak.max(height());
    }

    // Mid-air requests are consumed without a second impulse
    let rising = body_velocity(&engine, physics, player).y;
    request(Vec3::zeros(), true);
    engine.tick(DT).unwrap();
    let state = world.get_cloned::<CharacterControllerState>(player).unwrap();
    assert!(!state.on_ground);
    assert!(!state.jump_requested);
    assert!(body_velocity(&engine, physics, player).y < rising);

    for _ in 0..120 {
        engine.tick(DT).unwrap();
        peak = peak.max(height());
    }

    // One 5 m/s jump rises about v^2 / 2g
    assert_relative_eq!(peak - standing, 25.0 / (2.0 * 9.81), max_relative = 0.1);
    let state = world.get_cloned::<CharacterControllerState>(player).unwrap();
    assert!(state.on_ground);
    assert_relative_eq!(height(), standing, epsilon = 0.02);
}

#[test]
fn dynamic_body_falls_under_gravity() {
    let (mut engine, _) = engine();
    let physics = engine.create_physics_world().unwrap();
    let world = Arc::clone(engine.world());

    let ball = world.spawn();
    world.insert(ball, TransformComponent::from_position(Vec3::new(0.0, 10.0, 0.0))).unwrap();
    let desc = BodyDesc::dynamic(Shape::Sphere { radius: 0.5 }, 1.0);
    world.insert(ball, RigidBodyDescriptor::new(physics, desc)).unwrap();

    let frames = 60;
    for _ in 0..frames {
        engine.tick(DT).unwrap();
    }

    // Free fall for about a second: 0.5 * g * t^2
    let t = DT * frames as f32;
    let expected_drop = 0.5 * 9.81 * t * t;
    let y = world.get_cloned::<TransformComponent>(ball).unwrap().position().y;
    assert!(y < 10.0);
    assert_relative_eq!(10.0 - y, expected_drop, max_relative = 0.1);
    assert_relative_eq!(body_position(&engine, physics, ball).y, y, epsilon = 1e-5);
}

#[test]
fn frame_buffers_are_empty_after_render_but_registry_persists() {
    let (mut engine, device) = engine();
    let world = Arc::clone(engine.world());

    let camera = world.spawn();
    world.insert(camera, Camera::default()).unwrap();
    world.insert(camera, TransformComponent::from_position(Vec3::new(0.0, 2.0, 6.0))).unwrap();

    let cube = world.spawn();
    world.insert(cube, TransformComponent::identity()).unwrap();
    world.insert(cube, ModelComponent::new(hearth_engine::assets::ModelId(0))).unwrap();

    let lamp = world.spawn();
    world.insert(lamp, TransformComponent::from_position(Vec3::new(0.0, 3.0, 0.0))).unwrap();
    world.insert(lamp, LightComponent::point(Vec3::new(1.0, 0.9, 0.8), 2.0, 10.0)).unwrap();

    let sprite = Sprite::new(TextureHandle::WHITE, Vec2::new(100.0, 100.0), Vec2::new(64.0, 96.0));
    engine.scene().add_sprite_to_scene(sprite).unwrap();

    engine.tick(DT).unwrap();

    assert!(engine.scene().models().is_empty());
    assert!(engine.scene().lights().is_empty());
    assert!(engine.scene().is_frame_empty());
    assert_eq!(engine.scene().scene_sprite_count(), 1);

    let draws = device
        .last_frame()
        .iter()
        .filter(|command| matches!(command, GpuCommand::Draw { .. }))
        .count();
    // Shadow and main pass for the cube, one sprite batch, the blit
    assert_eq!(draws, 4);

    engine.tick(DT).unwrap();
    assert_eq!(engine.scene().scene_sprite_count(), 1);
    assert_eq!(device.frames_committed(), 2);
}

#[test]
fn serial_systems_never_overlap() {
    let (mut engine, _) = engine();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    for index in 0..4 {
        let (active, peak, runs) = (Arc::clone(&active), Arc::clone(&peak), Arc::clone(&runs));
        engine.scheduler_mut().add_system(
            Phase::GameLogic,
            FnSystem::new(format!("serial_{index}"), SystemAccess::new().serial(), move |_ctx: &FrameContext| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                active.fetch_sub(1, Ordering::SeqCst);
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
    }
    for index in 0..4 {
        engine.scheduler_mut().add_system(
            Phase::GameLogic,
            FnSystem::new(format!("parallel_{index}"), SystemAccess::new(), |_ctx: &FrameContext| {
                thread::sleep(Duration::from_millis(1));
                Ok(())
            }),
        );
    }

    for _ in 0..3 {
        engine.tick(DT).unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 12);
}
