//! # Hearth Engine
//!
//! A phased ECS game engine with transform hierarchies, a rigid-body physics
//! bridge and batched scene rendering behind a command-oriented device.
//!
//! ## Features
//!
//! - **Phased scheduling**: systems declare component access and run in
//!   parallel waves inside eight strictly ordered frame phases
//! - **Transform hierarchy**: rigid 3D and 2D parent/child transforms
//! - **Physics bridge**: kinematic poses in, simulation step, dynamic poses out
//! - **Scene assembly**: per-frame models, lights, skybox and sprites plus a
//!   persistent, sorted sprite registry
//! - **Headless rendering**: [`render::RecordingDevice`] validates and records
//!   the command stream without a GPU
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         let camera = engine.world().spawn();
//!         engine.world().insert(camera, Camera::default()).map_err(|e| AppError::Custom(e.to_string()))?;
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(EngineConfig::default(), Box::new(RecordingDevice::new()))?;
//!     engine.run_fixed(&mut MyApp, 1.0 / 60.0, 600)?;
//!     Ok(())
//! }
//! ```

pub mod foundation;
pub mod config;
pub mod ecs;
pub mod physics;
pub mod render;
pub mod input;
pub mod assets;
pub mod audio;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use config::EngineConfig;
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, AppEvent, Application,
        Engine, EngineConfig, EngineError,
        config::Config,
        foundation::{
            math::{Mat4, Quat, Transform, Transform2D, Vec2, Vec3},
            time::{FrameTime, Stopwatch},
        },
        ecs::{
            components::{Transform2DComponent, TransformComponent},
            Component, Entity, FnSystem, FrameContext, Phase, System, SystemAccess, SystemError, World,
        },
        assets::{AssetManager, ModelId},
        render::{
            Camera, LightComponent, ModelComponent, RecordingDevice, SceneAssembly, SkyboxComponent, Sprite,
            SpriteComponent,
        },
        input::{Action, InputManager, KeyCode, MouseButton},
        physics::{BodyDesc, PhysicsWorld, RigidBodyDescriptor, Shape},
    };
}
