//! Turn-based dungeon crawl engine.
//!
//! This crate provides:
//! - Dice notation, d20 checks and a swappable `Roller`
//! - Room-by-room dungeon progression with monsters, traps and treasure
//! - A combat state machine with abilities, defending and fleeing
//! - Rewards, death penalties and per-player persistence
//! - Optional flavor text from Claude, with fixed fallbacks
//!
//! # Quick Start
//!
//! ```ignore
//! use delve_core::{Action, DungeonSession, JsonStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = DungeonSession::new(JsonStore::new("saves"));
//!     let player = session.create_player("Vera", "swordsman").await?;
//!
//!     let response = session
//!         .handle(player.id, "enter Castle of Shadows".parse()?)
//!         .await?;
//!     println!("{}", response.text());
//!
//!     let response = session.handle(player.id, Action::Search).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod combat;
pub mod config;
pub mod dice;
pub mod dungeon;
pub mod encounter;
pub mod items;
pub mod monsters;
pub mod narrative;
pub mod player;
pub mod rewards;
pub mod rules;
pub mod session;
pub mod store;
pub mod testing;

// Primary public API
pub use combat::{CombatOutcome, CombatPhase};
pub use config::DungeonConfig;
pub use dice::Roller;
pub use dungeon::DungeonState;
pub use narrative::{NarrativeConfig, NarrativeProvider, StaticNarrator};
pub use player::{Player, PlayerId};
pub use rules::{Action, ActionError, Effect, ParseActionError, RulesEngine};
pub use session::{DungeonSession, Response, SessionConfig, SessionError, ShopInvalidator};
pub use store::{JsonStore, MemoryStore, PlayerStore, StoreError};
pub use testing::{ScriptedDice, TestHarness};
