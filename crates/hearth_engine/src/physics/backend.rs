//! Physics backend interface
//!
//! The engine talks to a rigid-body world exclusively through
//! [`PhysicsBackend`]. The simulation behind it is opaque: the bridge systems
//! only push kinematic poses, step, and read simulated poses back.

use super::collision::Shape;
use super::PhysicsError;
use crate::foundation::math::{Transform, Vec3};
use serde::{Deserialize, Serialize};

slotmap::new_key_type! {
    /// Handle of a body inside one physics world
    pub struct BodyHandle;
}

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    /// Simulated: moved by gravity, impulses and contacts
    Dynamic,
    /// Driven by game logic; pushes dynamic bodies but is never pushed
    Kinematic,
    /// Never moves
    Static,
}

/// Parameters for creating a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    /// Simulation mode
    pub kind: BodyKind,
    /// Collision shape
    pub shape: Shape,
    /// Mass in kilograms (dynamic bodies only)
    pub mass: f32,
    /// Bounciness in `[0, 1]`
    pub restitution: f32,
    /// Tangential velocity loss per contact in `[0, 1]`
    pub friction: f32,
    /// Velocity damping per second
    pub linear_damping: f32,
    /// Keep the orientation fixed regardless of angular velocity
    pub lock_rotation: bool,
    /// Allow the body to fall asleep when resting
    pub can_sleep: bool,
}

impl BodyDesc {
    /// Dynamic body with default material
    pub fn dynamic(shape: Shape, mass: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape,
            mass,
            restitution: 0.0,
            friction: 0.5,
            linear_damping: 0.05,
            lock_rotation: false,
            can_sleep: true,
        }
    }

    /// Kinematic body
    pub fn kinematic(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Kinematic,
            mass: 0.0,
            ..Self::dynamic(shape, 0.0)
        }
    }

    /// Static body
    pub fn fixed(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Static,
            mass: 0.0,
            ..Self::dynamic(shape, 0.0)
        }
    }

    /// Builder pattern: Set restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Builder pattern: Set friction
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction.clamp(0.0, 1.0);
        self
    }

    /// Builder pattern: Lock rotation
    pub fn with_locked_rotation(mut self) -> Self {
        self.lock_rotation = true;
        self
    }

    /// Builder pattern: Never sleep
    pub fn without_sleep(mut self) -> Self {
        self.can_sleep = false;
        self
    }

    /// Check the descriptor before creating a body from it
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !self.shape.is_valid() {
            return Err(PhysicsError::InvalidDescriptor(format!("degenerate shape {:?}", self.shape)));
        }
        if self.kind == BodyKind::Dynamic && !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(PhysicsError::InvalidDescriptor(format!(
                "dynamic body needs a positive mass, got {}",
                self.mass
            )));
        }
        Ok(())
    }
}

/// A contact reported by [`PhysicsBackend::contact_test`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// The other body in contact
    pub other: BodyHandle,
    /// Unit normal pointing from the other body towards the queried one
    pub normal: Vec3,
    /// Penetration depth (slightly negative when merely touching)
    pub depth: f32,
    /// World-space contact point
    pub point: Vec3,
}

/// Rigid-body world consumed by the physics bridge
pub trait PhysicsBackend: Send + Sync {
    /// Advance the simulation by `dt` seconds split into `substeps` steps
    fn step(&mut self, dt: f32, substeps: u32);

    /// Insert a body at the given world pose
    fn add_body(&mut self, desc: &BodyDesc, transform: Transform) -> BodyHandle;

    /// Remove a body
    fn remove_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError>;

    /// Move a body (teleport for dynamic bodies, drive for kinematic ones)
    fn set_body_transform(&mut self, handle: BodyHandle, transform: Transform) -> Result<(), PhysicsError>;

    /// Current world pose of a body
    fn body_transform(&self, handle: BodyHandle) -> Result<Transform, PhysicsError>;

    /// Whether the simulation moved the body during the last step
    ///
    /// False for sleeping, static and kinematic bodies.
    fn is_body_active(&self, handle: BodyHandle) -> bool;

    /// Linear velocity of a body
    fn linear_velocity(&self, handle: BodyHandle) -> Result<Vec3, PhysicsError>;

    /// Replace the linear velocity of a body, waking it
    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError>;

    /// Apply an instantaneous impulse through the center of mass, waking the body
    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<(), PhysicsError>;

    /// Every body currently touching the given one
    fn contact_test(&self, handle: BodyHandle) -> Result<Vec<ContactPoint>, PhysicsError>;

    /// Number of live bodies
    fn body_count(&self) -> usize;

    /// Gravity applied to dynamic bodies
    fn gravity(&self) -> Vec3;
}
