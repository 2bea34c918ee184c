//! # Gin Rummy
//!
//! A gin rummy table against a greedy computer opponent, plus a physics
//! playground scene, built on Hearth Engine.
//!
//! The rules live in [`game`] and know nothing about the engine; [`table`]
//! turns them into an animated sprite table and [`systems`] drives it from
//! the frame scheduler.

pub mod ai;
pub mod animation;
pub mod cards;
pub mod components;
pub mod config;
pub mod game;
pub mod hand;
pub mod scenes;
pub mod systems;
pub mod table;

pub use ai::{AiAction, AiPlayer, AiTurn};
pub use cards::{Card, Deck, Rank, Suit};
pub use config::{GameConfig, SceneChoice};
pub use game::{DrawSource, GameError, GamePhase, GinRummy, HandResult, Outcome, Rules, Seat};
pub use hand::{Grouping, Hand, Meld, MeldKind};
pub use table::{CardTable, TableLayout};
