//! Error types shared by the logic modules.
//!
//! Only programming errors live here: unknown references and lifecycle
//! violations. Expected "not possible" outcomes (no path, no generation
//! target, declined payment) are ordinary return values.

use thiserror::Error;

use crate::disruption::Lifecycle;
use crate::ids::{DisruptionId, LocationId, RouteId};

/// Result alias for logic operations.
pub type Result<T> = std::result::Result<T, LogisticsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogisticsError {
    #[error("unknown location {0}")]
    UnknownLocation(LocationId),

    #[error("unknown route {0}")]
    UnknownRoute(RouteId),

    #[error("unknown disruption {0}")]
    UnknownDisruption(DisruptionId),

    #[error("invalid route {source_id} -> {target}: {reason}")]
    InvalidRoute {
        source_id: LocationId,
        target: LocationId,
        reason: &'static str,
    },

    #[error("disruption {id} cannot {action} while {state:?}")]
    InvalidTransition {
        id: DisruptionId,
        action: &'static str,
        state: Lifecycle,
    },

    #[error("disruption {0} is active but carries no rollback snapshot")]
    MissingSnapshot(DisruptionId),
}
