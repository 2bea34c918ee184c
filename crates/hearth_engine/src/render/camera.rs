//! Camera component and per-frame camera data

use crate::ecs::Component;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Transform, Vec3};

/// Perspective camera attached to an entity
///
/// The camera looks down its entity's local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Width over height of the target
    pub aspect: f32,
    /// Only the active camera is submitted
    pub active: bool,
}

impl Component for Camera {}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(utils::deg_to_rad(60.0), 16.0 / 9.0, 0.1, 200.0)
    }
}

impl Camera {
    /// Create an active perspective camera
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            near,
            far,
            aspect,
            active: true,
        }
    }

    /// Projection matrix
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }
}

/// Matrices of the camera the frame is rendered with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    /// World-to-view matrix
    pub view: Mat4,
    /// View-to-clip matrix
    pub projection: Mat4,
    /// World-space eye position
    pub position: Vec3,
}

impl Default for CameraData {
    fn default() -> Self {
        let position = Vec3::new(0.0, 2.0, 5.0);
        Self {
            view: Mat4::look_at(position, Vec3::zeros(), Vec3::y()),
            projection: Camera::default().projection(),
            position,
        }
    }
}

impl CameraData {
    /// Camera data from a camera and its world transform
    pub fn from_world(camera: &Camera, world: &Transform) -> Self {
        Self {
            view: world.inverse().to_matrix(),
            projection: camera.projection(),
            position: world.translation,
        }
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// View-projection without the translation, for the skybox
    pub fn rotation_only_view_projection(&self) -> Mat4 {
        let mut view = self.view;
        view[(0, 3)] = 0.0;
        view[(1, 3)] = 0.0;
        view[(2, 3)] = 0.0;
        self.projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_maps_eye_to_origin() {
        let world = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let data = CameraData::from_world(&Camera::default(), &world);

        let eye = data.view * nalgebra::Vector4::new(1.0, 2.0, 3.0, 1.0);
        assert_relative_eq!(eye.xyz(), Vec3::zeros(), epsilon = 1e-5);
        assert_relative_eq!(data.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_skybox_matrix_ignores_translation() {
        let near = CameraData::from_world(&Camera::default(), &Transform::identity());
        let far = CameraData::from_world(&Camera::default(), &Transform::from_translation(Vec3::new(50.0, 0.0, 0.0)));

        assert_relative_eq!(
            near.rotation_only_view_projection(),
            far.rotation_only_view_projection(),
            epsilon = 1e-5
        );
    }
}
