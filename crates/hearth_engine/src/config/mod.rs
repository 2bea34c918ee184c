//! Configuration system
//!
//! Engine configuration is plain serde data loaded from TOML or RON files,
//! with defaults for every field so partial files stay valid.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        Self::parse(path, &contents)
    }

    /// Parse configuration text, choosing the format from the path extension
    fn parse(path: &str, contents: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Window dimensions used for projection aspect ratios
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Surface width in pixels
    pub width: u32,
    /// Surface height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

impl WindowConfig {
    /// Width divided by height
    pub fn aspect_ratio(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// # Engine Configuration
///
/// Core engine behavior: logging, worker pool, frame budgets and physics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Log level for the engine
    pub log_level: String,
    /// Number of worker threads executing systems within a phase
    pub worker_threads: usize,
    /// Initial time scale of the frame clock
    pub time_scale: f32,
    /// Maximum number of lights queued in a single frame
    pub max_lights_per_frame: usize,
    /// Capacity of the persistent sprite registry
    pub max_scene_sprites: usize,
    /// Physics substeps per frame step
    pub physics_substeps: u32,
    /// Gravity applied to newly created physics worlds
    pub gravity: [f32; 3],
    /// Presentation surface
    pub window: WindowConfig,
    /// Shadow map edge length in texels
    pub shadow_map_size: u32,
    /// Clear color of the main pass
    pub clear_color: [f32; 4],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            worker_threads: 4,
            time_scale: 1.0,
            max_lights_per_frame: crate::render::lighting::MAX_LIGHTS,
            max_scene_sprites: 1024,
            physics_substeps: 10,
            gravity: [0.0, -9.81, 0.0],
            window: WindowConfig::default(),
            shadow_map_size: 2048,
            clear_color: [0.05, 0.08, 0.06, 1.0],
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set worker thread count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Set the per-frame light budget
    pub fn with_max_lights(mut self, lights: usize) -> Self {
        self.max_lights_per_frame = lights;
        self
    }

    /// Set the persistent sprite registry capacity
    pub fn with_max_scene_sprites(mut self, sprites: usize) -> Self {
        self.max_scene_sprites = sprites;
        self
    }

    /// Set the initial time scale
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".to_string()));
        }
        if self.max_lights_per_frame == 0 || self.max_lights_per_frame > crate::render::lighting::MAX_LIGHTS {
            return Err(ConfigError::Invalid(format!(
                "max_lights_per_frame must be in 1..={}",
                crate::render::lighting::MAX_LIGHTS
            )));
        }
        if self.physics_substeps == 0 {
            return Err(ConfigError::Invalid("physics_substeps must be at least 1".to_string()));
        }
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            return Err(ConfigError::Invalid("time_scale must be finite and non-negative".to_string()));
        }
        Ok(())
    }
}

impl Config for EngineConfig {}
