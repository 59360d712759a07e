//! Supplyline Core - stateful game engine
//!
//! Wraps the pure rules in `supplyline-logic` with the shared world, locking,
//! player cash and save files. An external driver owns the clock and calls
//! the day hooks; nothing here runs on its own.
//!
//! # Example
//!
//! ```rust,no_run
//! use supplyline_core::prelude::*;
//! use supplyline_logic::config::GameConfig;
//! use supplyline_logic::network::Network;
//!
//! let engine = GameEngine::with_seed(GameConfig::default(), Network::new(), 7);
//! let ada = engine.register_player("Ada");
//!
//! for _ in 0..30 {
//!     let report = engine.advance_day().unwrap();
//!     println!("day {}: {} spikes started", report.day, report.started.len());
//! }
//! # let _ = ada;
//! ```

pub mod engine;
pub mod persistence;
pub mod treasury;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::engine::{DayReport, GameEngine, PlayerState, World};
    pub use crate::persistence::SaveError;
    pub use crate::treasury::Treasury;
}
