//! Pure logistics and disruption logic for Supplyline.
//!
//! This crate contains the game rules that are independent of any storage,
//! locking, or UI. Functions take plain data and return results, so every
//! rule is unit-testable on its own and the stateful engine in
//! `supplyline-core` only has to sequence them.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Tunable generation parameters loaded from JSON |
//! | [`constraints`] | Caps, cooldowns and overlap windows for new spikes |
//! | [`disruption`] | Spike records, effect payloads, lifecycle and ledger |
//! | [`effects`] | Apply / rollback / early resolution per spike kind |
//! | [`error`] | Structural and invariant errors |
//! | [`generator`] | Guaranteed and opportunistic spike generation |
//! | [`ids`] | Strongly typed identifiers |
//! | [`market`] | Price and demand multipliers read from active spikes |
//! | [`network`] | Locations and routes (directed multigraph) |
//! | [`orders`] | Order records and the `OrderBook` seam used by delays |
//! | [`routing`] | Reachability, per-player Dijkstra and the snapshot cache |

pub mod config;
pub mod constraints;
pub mod disruption;
pub mod effects;
pub mod error;
pub mod generator;
pub mod ids;
pub mod market;
pub mod network;
pub mod orders;
pub mod routing;

pub use error::{LogisticsError, Result};
