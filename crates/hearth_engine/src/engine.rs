//! Core engine implementation

use std::sync::Arc;

use crate::{
    application::{AppEvent, Application},
    assets::AssetManager,
    audio::MusicPlayer,
    config::{ConfigError, EngineConfig},
    ecs::{Entity, FrameContext, FrameReport, SchedulerError, SystemScheduler, World},
    foundation::{
        logging,
        math::Vec3,
        time::{FrameClock, FrameTime},
    },
    input::{Action, InputManager},
    physics::{self, PhysicsWorld},
    render::{self, Camera, GraphicsDevice, RenderManager, RenderSettings, SceneAssembly},
};
use thiserror::Error;

/// Main engine struct
///
/// The engine owns the shared world and scene assembly, the phased scheduler,
/// the input manager and the frame clock, and drives one frame per
/// [`Engine::tick`].
pub struct Engine {
    world: Arc<World>,
    scene: Arc<SceneAssembly>,
    scheduler: SystemScheduler,
    input: InputManager,
    clock: FrameClock,
    config: EngineConfig,
    running: bool,
    failed_frames: u64,
}

impl Engine {
    /// Create a new engine instance
    ///
    /// Validates the configuration, initializes logging, creates every
    /// subsystem and registers the built-in physics and render systems.
    pub fn new(config: EngineConfig, device: Box<dyn GraphicsDevice>) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_with_level(&config.log_level);
        log::info!("Initializing engine...");

        let world = Arc::new(World::new());
        world.insert_resource(AssetManager::new());
        world.insert_resource(MusicPlayer::default());

        let scene = Arc::new(SceneAssembly::new(config.max_lights_per_frame, config.max_scene_sprites));
        let scheduler = SystemScheduler::new(config.worker_threads)?;

        let mut engine = Self {
            world,
            scene,
            scheduler,
            input: InputManager::new(),
            clock: FrameClock::with_time_scale(config.time_scale),
            config,
            running: true,
            failed_frames: 0,
        };
        engine.setup(device);

        log::info!(
            "Engine ready: {} worker threads, {} lights per frame, {} scene sprites",
            engine.config.worker_threads,
            engine.config.max_lights_per_frame,
            engine.config.max_scene_sprites
        );
        Ok(engine)
    }

    fn setup(&mut self, device: Box<dyn GraphicsDevice>) {
        physics::register_hooks(&self.world);
        physics::add_physics_systems(&mut self.scheduler);

        let renderer = RenderManager::new(RenderSettings::from_config(&self.config));
        render::add_render_systems(&mut self.scheduler, renderer, device);
    }

    /// Run one frame with an explicit real-time delta in seconds
    ///
    /// Ticks the clock, snapshots input and executes every phase. A failing
    /// system aborts the rest of the frame; the scene's per-frame buffers are
    /// then discarded so the next frame starts clean.
    pub fn tick(&mut self, delta_time: f32) -> Result<FrameReport, EngineError> {
        let time = self.clock.tick(delta_time);
        self.run_scheduled(time)
    }

    fn run_scheduled(&mut self, time: FrameTime) -> Result<FrameReport, EngineError> {
        let input = self.input.begin_frame();
        if input.pressed_once(Action::Quit) {
            self.quit();
        }

        let ctx = FrameContext::new(Arc::clone(&self.world), Arc::clone(&self.scene), time, input);
        match self.scheduler.run_frame(ctx) {
            Ok(report) => Ok(report),
            Err(error) => {
                self.failed_frames += 1;
                self.scene.clear_frame();
                Err(EngineError::Frame(error))
            }
        }
    }

    /// Run the main loop on wall-clock time until the application quits
    ///
    /// Returns the number of frames executed.
    pub fn run<T: Application>(&mut self, app: &mut T) -> Result<u64, EngineError> {
        self.run_loop(app, None)
    }

    /// Run `frames` frames with a fixed delta, e.g. for headless runs
    pub fn run_fixed<T: Application>(&mut self, app: &mut T, delta_time: f32, frames: u64) -> Result<u64, EngineError> {
        self.run_loop(app, Some((delta_time, frames)))
    }

    fn run_loop<T: Application>(&mut self, app: &mut T, fixed: Option<(f32, u64)>) -> Result<u64, EngineError> {
        app.initialize(self)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;

        log::info!("Starting main loop...");
        let mut frames = 0;

        while self.running && !app.should_quit(self) {
            if let Some((_, limit)) = fixed {
                if frames >= limit {
                    break;
                }
            }

            let time = match fixed {
                Some((delta, _)) => self.clock.tick(delta),
                None => self.clock.tick_realtime(),
            };

            // An aborted frame is reported and the loop moves on
            if let Err(error) = self.run_scheduled(time) {
                log::error!("{error}");
            }
            frames += 1;

            app.update(self, &time)
                .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;
        }

        app.cleanup(self);
        log::info!("Engine shutdown complete after {frames} frames ({} failed)", self.failed_frames);
        Ok(frames)
    }

    /// Handle an application event
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::WindowCloseRequested => self.quit(),
            AppEvent::WindowResized { width, height } => self.resize(width, height),
            AppEvent::KeyInput { key, pressed } => self.input.handle_key_input(key, pressed),
            AppEvent::MouseButton { button, pressed } => self.input.handle_mouse_button(button, pressed),
            AppEvent::MouseMoved { x, y } => self.input.handle_mouse_move(x, y),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.window.width = width;
        self.config.window.height = height;
        let aspect = self.config.window.aspect_ratio();
        for (_, camera) in self.world.write::<Camera>().iter_mut() {
            camera.aspect = aspect;
        }
        log::debug!("surface resized to {width}x{height}");
    }

    /// Spawn an entity owning a physics world built from the configuration
    pub fn create_physics_world(&self) -> Result<Entity, EngineError> {
        let [x, y, z] = self.config.gravity;
        let entity = self.world.spawn();
        let physics = PhysicsWorld::simple(Vec3::new(x, y, z)).with_substeps(self.config.physics_substeps);
        self.world
            .insert(entity, physics)
            .map_err(|e| EngineError::InitializationFailed(format!("physics world: {e}")))?;
        Ok(entity)
    }

    /// Request engine shutdown
    pub fn quit(&mut self) {
        if self.running {
            log::info!("Engine shutdown requested");
        }
        self.running = false;
    }

    /// Whether the main loop keeps going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Get the ECS world
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Get the scene assembly
    pub fn scene(&self) -> &Arc<SceneAssembly> {
        &self.scene
    }

    /// Get the scheduler, e.g. to register game systems
    pub fn scheduler_mut(&mut self) -> &mut SystemScheduler {
        &mut self.scheduler
    }

    /// Get the scheduler
    pub fn scheduler(&self) -> &SystemScheduler {
        &self.scheduler
    }

    /// Get mutable access to the input manager
    pub fn input_mut(&mut self) -> &mut InputManager {
        &mut self.input
    }

    /// Get the frame clock
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Get mutable access to the frame clock, e.g. to change the time scale
    pub fn clock_mut(&mut self) -> &mut FrameClock {
        &mut self.clock
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of frames aborted by a failing system
    pub fn failed_frames(&self) -> u64 {
        self.failed_frames
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine initialization failed
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scheduler could not be created
    #[error("Scheduler error: {0}")]
    Scheduler(SchedulerError),

    /// A frame was aborted
    #[error("Frame aborted: {0}")]
    Frame(SchedulerError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

impl From<SchedulerError> for EngineError {
    fn from(error: SchedulerError) -> Self {
        Self::Scheduler(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{FnSystem, Phase, SystemAccess, SystemError};
    use crate::input::KeyCode;
    use crate::render::RecordingDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> (Engine, RecordingDevice) {
        let device = RecordingDevice::new();
        let config = EngineConfig::new().with_worker_threads(2);
        let engine = Engine::new(config, Box::new(device.clone())).unwrap();
        (engine, device)
    }

    #[test]
    fn test_tick_renders_a_frame() {
        let (mut engine, device) = engine();

        let report = engine.tick(1.0 / 60.0).unwrap();

        assert_eq!(report.frame_index, 1);
        assert_eq!(device.frames_committed(), 1);
        assert_eq!(engine.clock().current().frame_count, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig::new().with_worker_threads(0);
        let result = Engine::new(config, Box::new(RecordingDevice::new()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_failed_frame_is_reported_and_next_frame_runs() {
        let (mut engine, device) = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        engine.scheduler_mut().add_system(
            Phase::GameLogic,
            FnSystem::new("fails_once", SystemAccess::new(), move |_ctx: &FrameContext| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(SystemError::Failed("first frame".to_string()));
                }
                Ok(())
            }),
        );

        assert!(matches!(engine.tick(0.016), Err(EngineError::Frame(_))));
        assert!(engine.tick(0.016).is_ok());
        assert_eq!(engine.failed_frames(), 1);
        assert_eq!(device.frames_committed(), 1);
    }

    #[test]
    fn test_quit_key_stops_the_loop() {
        struct Idle;
        impl Application for Idle {
            fn initialize(&mut self, _engine: &mut Engine) -> Result<(), crate::AppError> {
                Ok(())
            }
        }

        let (mut engine, _) = engine();
        engine.handle_event(AppEvent::KeyInput { key: KeyCode::Q, pressed: true });

        let frames = engine.run_fixed(&mut Idle, 0.016, 100).unwrap();

        assert_eq!(frames, 1);
        assert!(!engine.is_running());
    }

    #[test]
    fn test_resize_updates_camera_aspect() {
        let (mut engine, _) = engine();
        let entity = engine.world().spawn();
        engine.world().insert(entity, Camera::default()).unwrap();

        engine.handle_event(AppEvent::WindowResized { width: 800, height: 800 });

        let aspect = engine.world().get_cloned::<Camera>(entity).unwrap().aspect;
        approx::assert_relative_eq!(aspect, 1.0);
    }
}
