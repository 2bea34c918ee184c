//! Headless gin rummy runner
//!
//! Usage: `gin_rummy [config.toml|config.ron] [frames]`
//!
//! Runs the configured scene for a fixed number of frames against the
//! recording device and reports the score and the last frame's draw stats.

use gin_rummy::scenes;
use gin_rummy::{CardTable, GameConfig, SceneChoice, Seat};
use hearth_engine::prelude::*;
use hearth_engine::render::RenderStats;

const DEFAULT_CONFIG: &str = "gin_rummy.toml";
const DEFAULT_FRAMES: u64 = 3600;
const FRAME_DELTA: f32 = 1.0 / 60.0;

struct GinRummyApp {
    config: GameConfig,
}

impl Application for GinRummyApp {
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
        match self.config.scene {
            SceneChoice::CardTable => scenes::setup_card_table(engine, &self.config),
            SceneChoice::CubeTest => scenes::setup_cube_scene(engine).map(|_| ()),
        }
    }

    fn should_quit(&self, engine: &Engine) -> bool {
        engine
            .world()
            .resource::<CardTable>()
            .is_some_and(|table| table.game().winner().is_some() && table.animations().is_idle())
    }

    fn cleanup(&mut self, engine: &mut Engine) {
        if let Some(table) = engine.world().resource::<CardTable>() {
            let game = table.game();
            log::info!(
                "{} hands played, south {} north {}, winner {:?}",
                game.hands_played(),
                game.score(Seat::South),
                game.score(Seat::North),
                game.winner()
            );
        }
        if let Some(stats) = engine.world().resource::<RenderStats>() {
            log::info!("Last frame: {:?}", *stats);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let frames = match args.next() {
        Some(frames) => frames.parse()?,
        None => DEFAULT_FRAMES,
    };

    let mut config = GameConfig::load_or_default(&path)?;
    // Nobody is at the keyboard of a headless run
    config.autoplay = true;

    let mut engine = Engine::new(config.engine.clone(), Box::new(RecordingDevice::new()))?;
    let mut app = GinRummyApp { config };
    let ran = engine.run_fixed(&mut app, FRAME_DELTA, frames)?;
    log::info!("Ran {ran} frames, {} failed", engine.failed_frames());
    Ok(())
}
