//! Physics bridge systems
//!
//! Systems contain logic, components contain data. The five systems below
//! each own one step of the bridge and are registered in fixed phases by
//! [`add_physics_systems`](super::add_physics_systems).

use super::backend::{BodyDesc, BodyKind};
use super::components::{
    CharacterController, CharacterControllerState, PhysicsWorld, RigidBody, RigidBodyDescriptor,
};
use super::PhysicsError;
use crate::ecs::components::TransformComponent;
use crate::ecs::{hierarchy, Entity, FrameContext, System, SystemAccess, SystemError, World};
use crate::foundation::math::{Transform, Vec3};

/// Creates bodies for new descriptors and character controllers (frame start)
#[derive(Debug, Default)]
pub struct RigidBodySpawnSystem;

impl RigidBodySpawnSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

struct PendingBody {
    entity: Entity,
    world: Entity,
    desc: BodyDesc,
    character: bool,
}

impl System for RigidBodySpawnSystem {
    fn name(&self) -> &str {
        "rigid_body_spawn"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<TransformComponent>()
            .reads::<CharacterController>()
            .writes::<RigidBodyDescriptor>()
            .writes::<RigidBody>()
            .writes::<PhysicsWorld>()
            .writes::<CharacterControllerState>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let world = &ctx.world;

        let pending: Vec<PendingBody> = {
            let descriptors = world.read::<RigidBodyDescriptor>();
            let controllers = world.read::<CharacterController>();
            let bodies = world.read::<RigidBody>();

            let described = descriptors.iter().map(|(entity, descriptor)| PendingBody {
                entity,
                world: descriptor.world,
                desc: descriptor.desc,
                character: false,
            });
            let characters = controllers
                .iter()
                .filter(|(entity, _)| !bodies.contains(*entity))
                .map(|(entity, controller)| PendingBody {
                    entity,
                    world: controller.world,
                    desc: controller.body_desc(),
                    character: true,
                });
            described.chain(characters).collect()
        };

        for body in pending {
            let pose = match check_pending(world, &body) {
                Ok(pose) => pose,
                Err(error) => {
                    // Drop the request so later frames and later bodies still run
                    log::error!("cannot create body for {}: {error}", body.entity);
                    if body.character {
                        world.remove::<CharacterController>(body.entity);
                    } else {
                        world.remove::<RigidBodyDescriptor>(body.entity);
                    }
                    continue;
                }
            };

            // A descriptor re-attached to an entity replaces its previous body
            if !body.character {
                world.remove::<RigidBody>(body.entity);
            }

            let handle = {
                let mut worlds = world.write::<PhysicsWorld>();
                let Some(physics) = worlds.get_mut(body.world) else {
                    return Err(PhysicsError::InvalidWorld(body.world).into());
                };
                physics.backend_mut().add_body(&body.desc, pose)
            };

            world.insert(
                body.entity,
                RigidBody {
                    world: body.world,
                    handle,
                    kind: body.desc.kind,
                },
            )?;

            if body.character {
                if !world.has::<CharacterControllerState>(body.entity) {
                    world.insert(body.entity, CharacterControllerState::default())?;
                }
            } else {
                world.remove::<RigidBodyDescriptor>(body.entity);
            }
            log::debug!("created {:?} body for {}", body.desc.kind, body.entity);
        }

        Ok(())
    }
}

/// Initial world pose of a pending body, once its request is known to be usable
fn check_pending(world: &World, body: &PendingBody) -> Result<Transform, SystemError> {
    body.desc.validate()?;
    if !world.has::<PhysicsWorld>(body.world) {
        return Err(PhysicsError::InvalidWorld(body.world).into());
    }
    let transforms = world.read::<TransformComponent>();
    if transforms.contains(body.entity) {
        Ok(hierarchy::try_calculate_world_transform(&transforms, body.entity)?)
    } else {
        Ok(Transform::identity())
    }
}

/// Pushes kinematic world poses into the physics worlds (physics-in)
#[derive(Debug, Default)]
pub struct TransformsInSystem;

impl TransformsInSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for TransformsInSystem {
    fn name(&self) -> &str {
        "physics_transforms_in"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<TransformComponent>()
            .reads::<RigidBody>()
            .writes::<PhysicsWorld>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let transforms = ctx.world.read::<TransformComponent>();
        let bodies = ctx.world.read::<RigidBody>();
        let mut worlds = ctx.world.write::<PhysicsWorld>();

        // Only kinematic bodies are driven; dynamic ones belong to the simulation
        for (entity, body) in bodies.iter().filter(|(_, body)| body.kind == BodyKind::Kinematic) {
            if !transforms.contains(entity) {
                continue;
            }
            let pose = hierarchy::try_calculate_world_transform(&transforms, entity)?;
            let physics = worlds.get_mut(body.world).ok_or(PhysicsError::InvalidWorld(body.world))?;
            physics.backend_mut().set_body_transform(body.handle, pose)?;
        }

        Ok(())
    }
}

/// Ground check and movement edits for character capsules (physics-in)
#[derive(Debug, Default)]
pub struct CharacterControlSystem;

impl CharacterControlSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for CharacterControlSystem {
    fn name(&self) -> &str {
        "character_control"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<CharacterController>()
            .reads::<RigidBody>()
            .writes::<CharacterControllerState>()
            .writes::<PhysicsWorld>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let controllers = ctx.world.read::<CharacterController>();
        let bodies = ctx.world.read::<RigidBody>();
        let mut states = ctx.world.write::<CharacterControllerState>();
        let mut worlds = ctx.world.write::<PhysicsWorld>();

        for (entity, state) in states.iter_mut() {
            let (Some(controller), Some(body)) = (controllers.get(entity), bodies.get(entity)) else {
                continue;
            };
            let backend = worlds
                .get_mut(body.world)
                .ok_or(PhysicsError::InvalidWorld(body.world))?
                .backend_mut();

            let contacts = backend.contact_test(body.handle)?;
            state.on_ground = contacts
                .iter()
                .any(|contact| contact.normal.y >= controller.ground_threshold);

            let velocity = backend.linear_velocity(body.handle)?;
            let desired = Vec3::new(state.desired_velocity.x, velocity.y, state.desired_velocity.z);
            backend.set_linear_velocity(body.handle, desired)?;

            if state.jump_requested {
                if state.on_ground {
                    backend.apply_impulse(body.handle, Vec3::y() * controller.jump_impulse)?;
                }
                state.jump_requested = false;
            }
        }

        Ok(())
    }
}

/// Advances every physics world by the scaled frame delta (physics-step)
#[derive(Debug, Default)]
pub struct PhysicsStepSystem;

impl PhysicsStepSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for PhysicsStepSystem {
    fn name(&self) -> &str {
        "physics_step"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new().writes::<PhysicsWorld>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let mut worlds = ctx.world.write::<PhysicsWorld>();
        for (_, physics) in worlds.iter_mut() {
            let substeps = physics.substeps();
            physics.backend_mut().step(ctx.time.delta, substeps);
        }
        Ok(())
    }
}

/// Writes simulated poses back into the hierarchy (physics-out)
#[derive(Debug, Default)]
pub struct TransformsOutSystem;

impl TransformsOutSystem {
    /// Create the system
    pub fn new() -> Self {
        Self
    }
}

impl System for TransformsOutSystem {
    fn name(&self) -> &str {
        "physics_transforms_out"
    }

    fn access(&self) -> SystemAccess {
        SystemAccess::new()
            .reads::<RigidBody>()
            .reads::<PhysicsWorld>()
            .writes::<TransformComponent>()
    }

    fn run(&mut self, ctx: &FrameContext) -> Result<(), SystemError> {
        let bodies = ctx.world.read::<RigidBody>();
        let worlds = ctx.world.read::<PhysicsWorld>();
        let mut transforms = ctx.world.write::<TransformComponent>();

        for (entity, body) in bodies.iter() {
            if body.kind == BodyKind::Kinematic || !transforms.contains(entity) {
                continue;
            }
            let backend = worlds.get(body.world).ok_or(PhysicsError::InvalidWorld(body.world))?.backend();
            if !backend.is_body_active(body.handle) {
                continue;
            }

            // Keeps whatever parent the entity has, e.g. a camera riding a capsule
            let pose = backend.body_transform(body.handle)?;
            hierarchy::set_local_from_world(&mut transforms, entity, pose)?;
        }

        Ok(())
    }
}
