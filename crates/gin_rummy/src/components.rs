//! Game-specific components

use hearth_engine::ecs::Component;
use hearth_engine::foundation::math::{Quat, Transform, Vec2, Vec3};
use nalgebra::Unit;

/// Rotates an entity around a fixed local axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spinner {
    /// Rotation axis
    pub axis: Unit<Vec3>,
    /// Angular speed in radians per second
    pub speed: f32,
}

impl Component for Spinner {}

impl Spinner {
    /// Spin around `axis`; a zero axis spins around +Y
    pub fn new(axis: Vec3, speed: f32) -> Self {
        Self {
            axis: Unit::try_new(axis, 1e-6).unwrap_or_else(Vec3::y_axis),
            speed,
        }
    }
}

/// Varies a light's intensity like a candle or an old bulb
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flicker {
    /// Intensity around which the light wavers
    pub base_intensity: f32,
    /// Largest deviation from the base
    pub amplitude: f32,
    /// Main oscillation in hertz
    pub frequency: f32,
    /// Offset so neighbouring lamps do not pulse together
    pub phase: f32,
}

impl Component for Flicker {}

impl Flicker {
    /// Flicker around `base_intensity`
    pub fn new(base_intensity: f32, amplitude: f32, frequency: f32) -> Self {
        Self {
            base_intensity,
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    /// Builder pattern: Set phase
    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase;
        self
    }

    /// Intensity at `time` seconds, never negative
    pub fn intensity_at(&self, time: f32) -> f32 {
        let t = time * self.frequency * std::f32::consts::TAU;
        let wave = 0.6 * (t + self.phase).sin() + 0.4 * (2.7 * t + 1.3 * self.phase).sin();
        (self.base_intensity + self.amplitude * wave).max(0.0)
    }
}

/// Camera behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    /// Circle a target point
    Orbit,
    /// Look out of the parent's eyes
    FirstPerson,
}

/// Mouse-driven camera placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    /// Current behaviour
    pub mode: CameraMode,
    /// Heading in radians; zero looks down -Z
    pub yaw: f32,
    /// Elevation in radians
    pub pitch: f32,
    /// Orbit radius
    pub distance: f32,
    /// Orbit center in world space
    pub target: Vec3,
    /// Eye offset above the parent in first person
    pub eye_height: f32,
    /// Radians per pixel of mouse movement
    pub sensitivity: f32,
}

impl Component for CameraRig {}

impl CameraRig {
    const MAX_PITCH: f32 = 1.4;

    /// Orbit `target` at `distance`
    pub fn orbit(target: Vec3, distance: f32) -> Self {
        Self {
            mode: CameraMode::Orbit,
            yaw: 0.0,
            pitch: 0.5,
            distance,
            target,
            eye_height: 1.6,
            sensitivity: 0.005,
        }
    }

    /// First-person view `eye_height` above the parent
    pub fn first_person(eye_height: f32) -> Self {
        Self {
            mode: CameraMode::FirstPerson,
            pitch: 0.0,
            eye_height,
            ..Self::orbit(Vec3::zeros(), 8.0)
        }
    }

    /// Switch between orbit and first person
    pub fn toggle(&mut self) {
        self.mode = match self.mode {
            CameraMode::Orbit => CameraMode::FirstPerson,
            CameraMode::FirstPerson => CameraMode::Orbit,
        };
        self.pitch = self.clamp_pitch(self.pitch);
    }

    fn clamp_pitch(&self, pitch: f32) -> f32 {
        match self.mode {
            CameraMode::Orbit => pitch.clamp(0.05, Self::MAX_PITCH),
            CameraMode::FirstPerson => pitch.clamp(-Self::MAX_PITCH, Self::MAX_PITCH),
        }
    }

    /// Apply a mouse movement in pixels
    pub fn look(&mut self, delta: Vec2) {
        self.yaw -= delta.x * self.sensitivity;
        let pitch = match self.mode {
            // Dragging down lifts the orbiting eye
            CameraMode::Orbit => self.pitch + delta.y * self.sensitivity,
            CameraMode::FirstPerson => self.pitch - delta.y * self.sensitivity,
        };
        self.pitch = self.clamp_pitch(pitch);
    }

    /// Horizontal viewing direction
    pub fn forward_flat(&self) -> Vec3 {
        Vec3::new(-self.yaw.sin(), 0.0, -self.yaw.cos())
    }

    /// Horizontal direction to the right of the view
    pub fn right_flat(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// World pose of the orbiting camera, looking at the target
    pub fn orbit_pose(&self) -> Transform {
        let offset = Vec3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        ) * self.distance;
        // The camera looks down -Z, so +Z points back at the eye
        let rotation = Quat::face_towards(&offset, &Vec3::y());
        Transform::from_rotation_translation(rotation, self.target + offset)
    }

    /// Local pose of the first-person camera relative to its parent
    pub fn first_person_pose(&self) -> Transform {
        let rotation = Quat::from_axis_angle(&Vec3::y_axis(), self.yaw) * Quat::from_axis_angle(&Vec3::x_axis(), self.pitch);
        Transform::from_rotation_translation(rotation, Vec3::new(0.0, self.eye_height, 0.0))
    }
}

/// Walking speed of the player capsule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerController {
    /// Meters per second
    pub speed: f32,
}

impl Component for PlayerController {}

impl Default for PlayerController {
    fn default() -> Self {
        Self { speed: 4.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbit_looks_at_target() {
        let mut rig = CameraRig::orbit(Vec3::new(1.0, 0.0, 0.0), 5.0);
        rig.yaw = 0.7;
        let pose = rig.orbit_pose();

        assert_relative_eq!((pose.translation - rig.target).norm(), 5.0, epsilon = 1e-4);
        let forward = pose.transform_vector(&-Vec3::z());
        let expected = (rig.target - pose.translation).normalize();
        assert_relative_eq!(forward, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_first_person_forward_matches_flat_forward() {
        let mut rig = CameraRig::first_person(1.6);
        rig.yaw = -1.1;
        let forward = rig.first_person_pose().transform_vector(&-Vec3::z());
        assert_relative_eq!(forward, rig.forward_flat(), epsilon = 1e-5);
        assert_relative_eq!(rig.right_flat().cross(&rig.forward_flat()), Vec3::y(), epsilon = 1e-5);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut rig = CameraRig::first_person(1.6);
        rig.look(Vec2::new(0.0, -10_000.0));
        assert_relative_eq!(rig.pitch, 1.4);

        rig.toggle();
        assert_eq!(rig.mode, CameraMode::Orbit);
        rig.look(Vec2::new(0.0, -10_000.0));
        assert_relative_eq!(rig.pitch, 0.05);
    }

    #[test]
    fn test_flicker_stays_near_base() {
        let flicker = Flicker::new(2.0, 0.5, 3.0).with_phase(1.0);
        for step in 0..100 {
            let intensity = flicker.intensity_at(step as f32 * 0.037);
            assert!((1.5..=2.5).contains(&intensity));
        }
        assert_relative_eq!(Flicker::new(0.1, 1.0, 1.0).intensity_at(0.75), 0.0);
    }
}
