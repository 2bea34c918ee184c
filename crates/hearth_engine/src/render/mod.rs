//! # Rendering System
//!
//! Scene assembly and frame rendering on top of a command-oriented graphics
//! device.
//!
//! ## Architecture
//!
//! - **Scene assembly**: per-frame buffers of models, lights, skybox and
//!   sprites, plus the persistent sprite registry
//! - **Queue systems**: translate components into scene submissions during
//!   the render-queue phase
//! - **Renderer**: shadow, main, skybox, sprite and blit passes, with
//!   redundant state changes elided
//! - **Device**: [`GraphicsDevice`] hides the GPU API; [`RecordingDevice`]
//!   validates and records command streams headlessly

pub mod camera;
pub mod components;
pub mod device;
pub mod lighting;
pub mod renderer;
pub mod scene;
pub mod sprite_registry;
pub mod systems;

pub use camera::{Camera, CameraData};
pub use components::{ModelComponent, SkyboxComponent, SpriteComponent};
pub use device::{
    Bindings, ClearFlags, GpuCommand, GraphicsDevice, MeshHandle, PassDesc, Pipeline, RecordingDevice, RenderTarget,
    TextureHandle, UniformSlot,
};
pub use lighting::{LightComponent, LightData, LightType, LightUniformBlock, MAX_LIGHTS};
pub use renderer::{RenderManager, RenderSettings, RenderStats};
pub use scene::{AmbientLight, FrameSubmissions, ModelSubmission, SceneAssembly, SceneError, SkyboxSubmission};
pub use sprite_registry::{Sprite, SpriteBatch, SpriteSceneData, SpriteSceneId};
pub use systems::{
    CameraQueueSystem, LightQueueSystem, ModelQueueSystem, RenderDrawSystem, SkyboxQueueSystem, SpriteQueueSystem,
};

use crate::ecs::{Phase, SystemScheduler};

/// Errors that can occur during rendering operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// Occurs when the device cannot be created, typically due to missing
    /// drivers or an unusable presentation surface.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),

    /// Resource creation or management failed
    ///
    /// Occurs when GPU resources (buffers, textures, pipelines) cannot be
    /// created, typically due to memory constraints or invalid data.
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Device commands were issued out of order
    ///
    /// A draw outside a pass, nested passes, or a commit with a pass open.
    #[error("Invalid command order: {0}")]
    InvalidCommandOrder(String),

    /// Backend-specific error occurred
    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Register the render queue systems and the draw system
pub fn add_render_systems(scheduler: &mut SystemScheduler, renderer: RenderManager, device: Box<dyn GraphicsDevice>) {
    scheduler.add_system(Phase::RenderQueue, CameraQueueSystem::new());
    scheduler.add_system(Phase::RenderQueue, LightQueueSystem::new());
    scheduler.add_system(Phase::RenderQueue, ModelQueueSystem::new());
    scheduler.add_system(Phase::RenderQueue, SkyboxQueueSystem::new());
    scheduler.add_system(Phase::RenderQueue, SpriteQueueSystem::new());
    scheduler.add_system(Phase::RenderDraw, RenderDrawSystem::new(renderer, device));
}
