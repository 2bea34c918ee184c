//! Lighting data
//!
//! [`LightComponent`] is the authoring-side component. Every frame the light
//! queue system resolves each enabled light against the transform hierarchy
//! into a [`LightData`] submission; the renderer packs all submissions of the
//! frame into one [`LightUniformBlock`] applied once per main pass.

use crate::ecs::Component;
use crate::foundation::math::Vec3;
use bytemuck::{Pod, Zeroable};

/// Maximum number of lights queued in one frame
pub const MAX_LIGHTS: usize = 8;

/// Types of lights supported by the lighting system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Directional light (like sunlight) with parallel rays
    Directional,
    /// Point light that radiates in all directions from a position
    Point,
    /// Spot light that creates a cone of light from a position
    Spot,
}

impl LightType {
    fn gpu_code(self) -> f32 {
        match self {
            LightType::Directional => 0.0,
            LightType::Point => 1.0,
            LightType::Spot => 2.0,
        }
    }
}

/// Pure data component for lights
///
/// `direction` and `offset` are expressed in the owning entity's local frame;
/// the light follows its entity through the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct LightComponent {
    /// The type of light
    pub light_type: LightType,
    /// RGB color values for the light (0.0 to 1.0 range)
    pub color: Vec3,
    /// Light intensity multiplier
    pub intensity: f32,
    /// Direction for directional/spot lights, local to the entity
    pub direction: Vec3,
    /// Maximum range for point/spot lights
    pub range: f32,
    /// Inner cone angle for spot lights in radians
    pub inner_cone: f32,
    /// Outer cone angle for spot lights in radians
    pub outer_cone: f32,
    /// Whether the light is currently enabled
    pub enabled: bool,
    /// Whether this light should cast shadows
    pub cast_shadows: bool,
}

impl Component for LightComponent {}

impl LightComponent {
    /// Create directional light component
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            color,
            intensity,
            direction: direction.normalize(),
            range: 0.0,
            inner_cone: 0.0,
            outer_cone: 0.0,
            enabled: true,
            cast_shadows: true,
        }
    }

    /// Create point light component
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            direction: Vec3::new(0.0, -1.0, 0.0),
            range,
            cast_shadows: false,
            ..Self::directional(Vec3::new(0.0, -1.0, 0.0), color, intensity)
        }
    }

    /// Create spot light component
    pub fn spot(direction: Vec3, color: Vec3, intensity: f32, range: f32, inner_cone: f32, outer_cone: f32) -> Self {
        Self {
            light_type: LightType::Spot,
            range,
            inner_cone,
            outer_cone,
            cast_shadows: false,
            ..Self::directional(direction, color, intensity)
        }
    }
}

/// One light resolved to world space for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightData {
    /// The type of light
    pub light_type: LightType,
    /// World-space position
    pub position: Vec3,
    /// World-space direction (normalized)
    pub direction: Vec3,
    /// RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Range for point/spot lights
    pub range: f32,
    /// Inner cone angle in radians
    pub inner_cone: f32,
    /// Outer cone angle in radians
    pub outer_cone: f32,
    /// Whether this light drives the shadow pass
    pub cast_shadows: bool,
}

impl LightData {
    /// Directional light submission
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color,
            intensity,
            range: 0.0,
            inner_cone: 0.0,
            outer_cone: 0.0,
            cast_shadows: true,
        }
    }

    /// Point light submission
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            position,
            direction: Vec3::new(0.0, -1.0, 0.0),
            range,
            cast_shadows: false,
            ..Self::directional(Vec3::new(0.0, -1.0, 0.0), color, intensity)
        }
    }
}

/// GPU layout of one light (std140-compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// xyz position, w light type code
    pub position_type: [f32; 4],
    /// xyz direction, w range
    pub direction_range: [f32; 4],
    /// rgb color, a intensity
    pub color_intensity: [f32; 4],
    /// x cos(inner), y cos(outer), z shadow caster flag
    pub cone: [f32; 4],
}

impl From<&LightData> for GpuLight {
    fn from(light: &LightData) -> Self {
        Self {
            position_type: [light.position.x, light.position.y, light.position.z, light.light_type.gpu_code()],
            direction_range: [light.direction.x, light.direction.y, light.direction.z, light.range],
            color_intensity: [light.color.x, light.color.y, light.color.z, light.intensity],
            cone: [
                light.inner_cone.cos(),
                light.outer_cone.cos(),
                if light.cast_shadows { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// Per-frame light uniform block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniformBlock {
    /// rgb ambient color, a ambient intensity
    pub ambient: [f32; 4],
    /// x number of valid lights
    pub counts: [u32; 4],
    /// Light slots; only the first `counts[0]` are meaningful
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl LightUniformBlock {
    /// Pack up to [`MAX_LIGHTS`] lights
    pub fn from_lights(lights: &[LightData], ambient_color: Vec3, ambient_intensity: f32) -> Self {
        let mut block = Self::zeroed();
        block.ambient = [ambient_color.x, ambient_color.y, ambient_color.z, ambient_intensity];

        let count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in block.lights.iter_mut().zip(&lights[..count]) {
            *slot = GpuLight::from(light);
        }
        block.counts[0] = count as u32;
        block
    }

    /// Number of packed lights
    pub fn light_count(&self) -> usize {
        self.counts[0] as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_block_packs_lights_in_order() {
        let lights = [
            LightData::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 0.8),
            LightData::point(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 0.5, 0.2), 2.0, 10.0),
        ];

        let block = LightUniformBlock::from_lights(&lights, Vec3::new(0.1, 0.1, 0.1), 0.3);

        assert_eq!(block.light_count(), 2);
        assert_relative_eq!(block.lights[0].direction_range[1], -1.0);
        assert_relative_eq!(block.lights[1].position_type[3], 1.0);
        assert_relative_eq!(block.lights[1].direction_range[3], 10.0);
        assert_eq!(block.lights[2], GpuLight::zeroed());
    }

    #[test]
    fn test_uniform_block_is_plain_bytes() {
        let block = LightUniformBlock::from_lights(&[], Vec3::zeros(), 0.0);
        let bytes = bytemuck::bytes_of(&block);

        assert_eq!(bytes.len(), 32 + MAX_LIGHTS * 64);
    }
}
