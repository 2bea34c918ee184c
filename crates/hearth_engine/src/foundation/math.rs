//! Math utilities and types
//!
//! Provides fundamental math types for 3D graphics and game development.
//! Transforms used by the scene hierarchy are rigid: a rotation (orthonormal
//! basis) plus a translation. Scale is carried by render submissions instead.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
    UnitComplex,
};

use std::ops::Mul;

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid 3D transform: rotation (basis) followed by translation (origin)
///
/// Composition is basis-then-translate: applying `parent * child` to a point
/// `p` yields `parent.basis * (child.basis * p + child.origin) + parent.origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Orientation of the local basis
    pub rotation: Quat,

    /// Origin of the local frame
    pub translation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            rotation: Quat::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Create a transform with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// Create a transform with only a rotation
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    /// Create a transform from rotation and translation
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self { rotation, translation }
    }

    /// Rotation part as a 3x3 basis matrix
    pub fn basis(&self) -> Mat3 {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Compose `self * child`: the child's frame expressed in this transform's parent space
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform {
            rotation: self.rotation * child.rotation,
            translation: self.rotation * child.translation + self.translation,
        }
    }

    /// Inverse of this rigid transform
    ///
    /// Uses the quaternion conjugate, which equals the inverse of an
    /// orthonormal basis.
    pub fn inverse(&self) -> Transform {
        let inv_rotation = self.rotation.inverse();
        Transform {
            rotation: inv_rotation,
            translation: inv_rotation * (-self.translation),
        }
    }

    /// Compute `self⁻¹ * other`, i.e. `other` expressed relative to this frame
    pub fn inverse_compose(&self, other: &Transform) -> Transform {
        self.inverse().compose(other)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Apply only the rotation to a direction
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Convert to a homogeneous transformation matrix
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation) * self.rotation.to_homogeneous()
    }

    /// Component-wise closeness check used by hierarchy round-trip checks
    pub fn is_close(&self, other: &Transform, epsilon: f32) -> bool {
        (self.translation - other.translation).amax() <= epsilon
            && self.rotation.angle_to(&other.rotation) <= epsilon
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}

/// Rigid 2D transform used by sprite-space hierarchies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    /// Rotation angle in radians (counter-clockwise)
    pub rotation: f32,

    /// Origin of the local frame
    pub translation: Vec2,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    /// Identity transform
    pub fn identity() -> Self {
        Self {
            rotation: 0.0,
            translation: Vec2::zeros(),
        }
    }

    /// Create from angle and translation
    pub fn new(rotation: f32, translation: Vec2) -> Self {
        Self { rotation, translation }
    }

    /// Create a pure translation
    pub fn from_translation(translation: Vec2) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    fn unit(&self) -> UnitComplex<f32> {
        UnitComplex::new(self.rotation)
    }

    /// Compose `self * child`
    pub fn compose(&self, child: &Transform2D) -> Transform2D {
        Transform2D {
            rotation: self.rotation + child.rotation,
            translation: self.unit() * child.translation + self.translation,
        }
    }

    /// Inverse of this rigid transform
    pub fn inverse(&self) -> Transform2D {
        let inv = self.unit().inverse();
        Transform2D {
            rotation: -self.rotation,
            translation: inv * (-self.translation),
        }
    }

    /// Compute `self⁻¹ * other`
    pub fn inverse_compose(&self, other: &Transform2D) -> Transform2D {
        self.inverse().compose(other)
    }

    /// Express a point given in this transform's parent space in local space
    pub fn to_local(&self, point: &Vec2) -> Vec2 {
        self.unit().inverse() * (point - self.translation)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec2) -> Vec2 {
        self.unit() * point + self.translation
    }

    /// Component-wise closeness check
    pub fn is_close(&self, other: &Transform2D, epsilon: f32) -> bool {
        let angle = (self.unit().inverse() * other.unit()).angle();
        (self.translation - other.translation).amax() <= epsilon && angle.abs() <= epsilon
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }

    /// Smoothstep easing on `t` in `[0, 1]`
    pub fn smoothstep(t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// Extension trait for Mat4 with projection and view helpers
pub trait Mat4Ext {
    /// Create a perspective projection matrix (depth mapped to `[0, 1]`)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix (depth mapped to `[0, 1]`)
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = -1.0;
        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(2, 2)] = -1.0 / (far - near);
        result[(0, 3)] = -(right + left) / (right - left);
        result[(1, 3)] = -(top + bottom) / (top - bottom);
        result[(2, 3)] = -near / (far - near);
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        // Fall back to another up vector when looking straight along it
        let up = if forward.cross(&up).norm_squared() < 1e-8 {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            up
        };
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        Mat4::new(
            right.x, right.y, right.z, -right.dot(&eye),
            camera_up.x, camera_up.y, camera_up.z, -camera_up.dot(&eye),
            -forward.x, -forward.y, -forward.z, forward.dot(&eye),
            0.0, 0.0, 0.0, 1.0,
        )
    }
}
