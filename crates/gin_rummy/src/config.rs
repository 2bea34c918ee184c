//! Game configuration

use crate::game::Rules;
use hearth_engine::config::{Config, ConfigError, EngineConfig};
use serde::{Deserialize, Serialize};

/// Scene loaded at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SceneChoice {
    /// Gin rummy against the computer
    #[default]
    CardTable,
    /// Physics playground with spinning cubes and a walkable capsule
    CubeTest,
}

/// Game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seed of the card shuffles
    pub seed: u64,
    /// How long the computer "thinks" before a turn, in seconds
    pub ai_delay_seconds: f32,
    /// Duration of a card slide, in seconds
    pub card_move_seconds: f32,
    /// Highest deadwood a player may knock with
    pub knock_limit: u32,
    /// Score that ends the game
    pub target_score: u32,
    /// Scene loaded at startup
    pub scene: SceneChoice,
    /// Let the computer play the south seat too
    pub autoplay: bool,
    /// Engine settings
    pub engine: EngineConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            ai_delay_seconds: 0.8,
            card_move_seconds: 0.25,
            knock_limit: 10,
            target_score: 100,
            scene: SceneChoice::CardTable,
            autoplay: false,
            engine: EngineConfig::default(),
        }
    }
}

impl GameConfig {
    /// Rule parameters of the card game
    pub fn rules(&self) -> Rules {
        Rules {
            knock_limit: self.knock_limit,
            target_score: self.target_score,
        }
    }

    /// Load configuration from `path`, or the defaults when there is no file
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        if std::path::Path::new(path).exists() {
            Self::load_from_file(path)
        } else {
            log::info!("{path} not found, using default game configuration");
            Ok(Self::default())
        }
    }
}

impl Config for GameConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GameConfig::parse(
            "game.toml",
            "seed = 9\nscene = \"CubeTest\"\n\n[engine]\nworker_threads = 2\n",
        )
        .unwrap();

        assert_eq!(config.seed, 9);
        assert_eq!(config.scene, SceneChoice::CubeTest);
        assert_eq!(config.engine.worker_threads, 2);
        assert_eq!(config.knock_limit, 10);
        assert_eq!(config.target_score, 100);
    }

    #[test]
    fn test_ron_round_trip() {
        let config = GameConfig {
            autoplay: true,
            ..GameConfig::default()
        };
        let text = ron::ser::to_string(&config).unwrap();
        assert_eq!(GameConfig::parse("game.ron", &text).unwrap(), config);
    }
}
