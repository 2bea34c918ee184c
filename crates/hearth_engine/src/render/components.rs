//! Renderable components

use super::device::TextureHandle;
use super::sprite_registry::Sprite;
use crate::assets::ModelId;
use crate::ecs::Component;
use crate::foundation::math::{Vec2, Vec3};

/// Draws a model asset at the entity's world transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelComponent {
    /// Model asset
    pub model: ModelId,
    /// Scale applied on top of the rigid world transform
    pub scale: Vec3,
    /// RGBA color multiplier
    pub tint: [f32; 4],
    /// Whether the model is drawn into the shadow map
    pub cast_shadows: bool,
    /// Hidden models are not submitted
    pub visible: bool,
}

impl Component for ModelComponent {}

impl ModelComponent {
    /// Visible, shadow-casting model at unit scale
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            scale: Vec3::new(1.0, 1.0, 1.0),
            tint: [1.0; 4],
            cast_shadows: true,
            visible: true,
        }
    }

    /// Builder pattern: Set scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Builder pattern: Set tint
    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }
}

/// Queues the skybox every frame while enabled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyboxComponent {
    /// Cube map texture
    pub texture: TextureHandle,
    /// Brightness multiplier
    pub intensity: f32,
    /// Whether the skybox is drawn
    pub enabled: bool,
}

impl Component for SkyboxComponent {}

impl SkyboxComponent {
    /// Enabled skybox at full brightness
    pub fn new(texture: TextureHandle) -> Self {
        Self {
            texture,
            intensity: 1.0,
            enabled: true,
        }
    }
}

/// Transient sprite drawn at the entity's 2D world transform
///
/// The sprite's own position and rotation are offsets from the entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteComponent {
    /// Sprite template
    pub sprite: Sprite,
    /// Hidden sprites are not submitted
    pub visible: bool,
}

impl Component for SpriteComponent {}

impl SpriteComponent {
    /// Visible sprite centered on its entity
    pub fn new(texture: TextureHandle, size: Vec2) -> Self {
        Self {
            sprite: Sprite::new(texture, Vec2::zeros(), size),
            visible: true,
        }
    }

    /// Builder pattern: Set depth
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.sprite.depth = depth;
        self
    }

    /// Builder pattern: Enable alpha blending
    pub fn with_alpha(mut self) -> Self {
        self.sprite.alpha = true;
        self
    }
}
