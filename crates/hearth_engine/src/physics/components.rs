//! Physics components
//!
//! A physics world lives on its own entity as a [`PhysicsWorld`] component.
//! Bodies are created by attaching a [`RigidBodyDescriptor`] (or a
//! [`CharacterController`]) that names that world entity; the spawn system
//! replaces the descriptor with a live [`RigidBody`]. Removing the
//! `RigidBody`, or despawning its entity, removes the body from its world.

use super::backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend};
use super::collision::Shape;
use super::simple_world::SimplePhysicsWorld;
use crate::ecs::{Component, Entity};
use crate::foundation::math::Vec3;
use std::fmt;

/// A physics world owned by a world entity
pub struct PhysicsWorld {
    backend: Box<dyn PhysicsBackend>,
    substeps: u32,
}

impl Component for PhysicsWorld {}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("body_count", &self.backend.body_count())
            .field("gravity", &self.backend.gravity())
            .field("substeps", &self.substeps)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Substeps per frame step unless configured otherwise
    pub const DEFAULT_SUBSTEPS: u32 = 10;

    /// Wrap a backend
    pub fn new(backend: Box<dyn PhysicsBackend>) -> Self {
        Self {
            backend,
            substeps: Self::DEFAULT_SUBSTEPS,
        }
    }

    /// World backed by [`SimplePhysicsWorld`]
    pub fn simple(gravity: Vec3) -> Self {
        Self::new(Box::new(SimplePhysicsWorld::with_gravity(gravity)))
    }

    /// Builder pattern: Set substep count
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    /// Substeps per frame step
    pub fn substeps(&self) -> u32 {
        self.substeps
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.backend.body_count()
    }

    /// The simulation backend
    pub fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    /// The simulation backend, mutably
    pub fn backend_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.backend.as_mut()
    }
}

/// Request to create a rigid body for this entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyDescriptor {
    /// Entity owning the [`PhysicsWorld`]
    pub world: Entity,
    /// Body parameters
    pub desc: BodyDesc,
}

impl Component for RigidBodyDescriptor {}

impl RigidBodyDescriptor {
    /// Create a descriptor
    pub fn new(world: Entity, desc: BodyDesc) -> Self {
        Self { world, desc }
    }
}

/// A live rigid body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigidBody {
    /// Entity owning the [`PhysicsWorld`] the body lives in
    pub world: Entity,
    /// Handle inside that world
    pub handle: BodyHandle,
    /// Simulation mode
    pub kind: BodyKind,
}

impl Component for RigidBody {}

/// Capsule character driven by gameplay input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterController {
    /// Entity owning the [`PhysicsWorld`]
    pub world: Entity,
    /// Capsule radius
    pub radius: f32,
    /// Total capsule height, caps included
    pub height: f32,
    /// Body mass
    pub mass: f32,
    /// Upward impulse applied when jumping
    pub jump_impulse: f32,
    /// Minimum upward normal component for a contact to count as ground
    pub ground_threshold: f32,
}

impl Component for CharacterController {}

impl CharacterController {
    /// Create a controller with default proportions
    pub fn new(world: Entity) -> Self {
        Self {
            world,
            radius: 0.3,
            height: 1.8,
            mass: 70.0,
            jump_impulse: 350.0,
            ground_threshold: 0.7,
        }
    }

    /// Builder pattern: Set capsule size
    pub fn with_size(mut self, radius: f32, height: f32) -> Self {
        self.radius = radius;
        self.height = height.max(2.0 * radius);
        self
    }

    /// Builder pattern: Set jump impulse
    pub fn with_jump_impulse(mut self, impulse: f32) -> Self {
        self.jump_impulse = impulse;
        self
    }

    /// Body descriptor of the controller capsule
    pub fn body_desc(&self) -> BodyDesc {
        BodyDesc::dynamic(
            Shape::Capsule {
                radius: self.radius,
                half_height: (self.height * 0.5 - self.radius).max(0.0),
            },
            self.mass,
        )
        .with_friction(0.0)
        .with_locked_rotation()
        .without_sleep()
    }
}

/// Per-frame character state shared between gameplay and the physics bridge
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CharacterControllerState {
    /// Whether the capsule touched walkable ground before the last step
    pub on_ground: bool,
    /// Horizontal velocity requested by gameplay
    pub desired_velocity: Vec3,
    /// Jump on the next physics step if grounded
    pub jump_requested: bool,
}

impl Component for CharacterControllerState {}
