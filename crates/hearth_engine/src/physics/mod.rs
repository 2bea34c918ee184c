//! Physics bridge
//!
//! Synchronizes the transform hierarchy with rigid-body worlds in three
//! strictly ordered phases: kinematic poses are pushed in, every world is
//! stepped, and simulated poses are read back out. The simulation itself sits
//! behind [`PhysicsBackend`]; [`SimplePhysicsWorld`] is the built-in backend.

pub mod backend;
pub mod collision;
pub mod components;
pub mod simple_world;
pub mod systems;

pub use backend::{BodyDesc, BodyHandle, BodyKind, ContactPoint, PhysicsBackend};
pub use collision::{BoundingSphere, Contact, Ray, Shape};
pub use components::{CharacterController, CharacterControllerState, PhysicsWorld, RigidBody, RigidBodyDescriptor};
pub use simple_world::SimplePhysicsWorld;
pub use systems::{
    CharacterControlSystem, PhysicsStepSystem, RigidBodySpawnSystem, TransformsInSystem, TransformsOutSystem,
};

use crate::ecs::{Entity, Phase, SystemScheduler, World};

/// Physics errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// The handle does not name a body of this world
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// The referenced entity does not own a physics world
    #[error("{0} is not a physics world")]
    InvalidWorld(Entity),

    /// A physics world was torn down while bodies still referenced it
    #[error("physics world {world} still owns {count} bodies")]
    WorldHasBodies {
        /// The world entity
        world: Entity,
        /// Live body count
        count: usize,
    },

    /// A body descriptor cannot be simulated
    #[error("invalid body descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Register the component lifecycle hooks of the physics bridge
///
/// Removing a [`RigidBody`] removes its body from the owning world. Removing a
/// [`PhysicsWorld`] that still owns bodies is an authoring error. The hooks
/// lock the `PhysicsWorld` storage, so do not remove bodies while holding a
/// guard on it.
pub fn register_hooks(world: &World) {
    world.on_remove::<RigidBody, _>(|world, entity, body| {
        let mut worlds = world.write::<PhysicsWorld>();
        match worlds.get_mut(body.world) {
            Some(physics) => {
                if let Err(error) = physics.backend_mut().remove_body(body.handle) {
                    log::error!("failed to remove body of {entity}: {error}");
                }
            }
            None => log::error!("{entity} outlived its physics world {}", body.world),
        }
    });

    world.on_remove::<PhysicsWorld, _>(|_, entity, physics| {
        let count = physics.body_count();
        if count > 0 {
            log::error!("{}", PhysicsError::WorldHasBodies { world: entity, count });
            debug_assert!(count == 0, "physics world {entity} torn down with {count} live bodies");
        }
    });
}

/// Remove the physics world owned by `entity`, checking it is empty first
pub fn destroy_world(world: &World, entity: Entity) -> Result<PhysicsWorld, PhysicsError> {
    let count = world
        .read::<PhysicsWorld>()
        .get(entity)
        .map(PhysicsWorld::body_count)
        .ok_or(PhysicsError::InvalidWorld(entity))?;
    if count > 0 {
        return Err(PhysicsError::WorldHasBodies { world: entity, count });
    }
    world.remove::<PhysicsWorld>(entity).ok_or(PhysicsError::InvalidWorld(entity))
}

/// Register the bridge systems in their phases
pub fn add_physics_systems(scheduler: &mut SystemScheduler) {
    scheduler.add_system(Phase::FrameStart, RigidBodySpawnSystem::new());
    scheduler.add_system(Phase::PhysicsIn, TransformsInSystem::new());
    scheduler.add_system(Phase::PhysicsIn, CharacterControlSystem::new());
    scheduler.add_system(Phase::PhysicsStep, PhysicsStepSystem::new());
    scheduler.add_system(Phase::PhysicsOut, TransformsOutSystem::new());
}
