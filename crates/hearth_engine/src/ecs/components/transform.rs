//! Transform components for the ECS
//!
//! Pure data: a local rigid transform plus a weak parent reference. The parent
//! is looked up by handle only; a transform never owns or keeps its parent
//! alive. Hierarchy resolution lives in [`crate::ecs::hierarchy`].

use crate::ecs::{Component, Entity};
use crate::foundation::math::{Quat, Transform, Transform2D, Vec2, Vec3};

/// ECS 3D transform component
///
/// `local` is expressed in the parent's frame, or in world space when there
/// is no parent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformComponent {
    /// Rotation and translation relative to the parent
    pub local: Transform,

    /// Weak reference to the parent entity
    pub parent: Option<Entity>,
}

impl Component for TransformComponent {}

impl TransformComponent {
    /// Create identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create from a local transform
    pub fn new(local: Transform) -> Self {
        Self { local, parent: None }
    }

    /// Create from position only
    pub fn from_position(position: Vec3) -> Self {
        Self::new(Transform::from_translation(position))
    }

    /// Create from position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self::new(Transform::from_rotation_translation(rotation, position))
    }

    /// Builder pattern: Set position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.local.translation = position;
        self
    }

    /// Builder pattern: Set rotation from quaternion
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.local.rotation = rotation;
        self
    }

    /// Builder pattern: Set rotation from Euler angles (radians, XYZ order)
    pub fn with_rotation_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.local.rotation = Quat::from_euler_angles(x, y, z);
        self
    }

    /// Builder pattern: Set parent
    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Local position
    pub fn position(&self) -> Vec3 {
        self.local.translation
    }
}

/// ECS 2D transform component for sprite-space hierarchies
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform2DComponent {
    /// Angle and translation relative to the parent
    pub local: Transform2D,

    /// Weak reference to the parent entity
    pub parent: Option<Entity>,
}

impl Component for Transform2DComponent {}

impl Transform2DComponent {
    /// Create from a local transform
    pub fn new(local: Transform2D) -> Self {
        Self { local, parent: None }
    }

    /// Create from position only
    pub fn from_position(position: Vec2) -> Self {
        Self::new(Transform2D::from_translation(position))
    }

    /// Builder pattern: Set parent
    pub fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }
}
