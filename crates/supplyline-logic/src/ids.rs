//! Strongly typed identifiers.
//!
//! Every id is a transparent newtype so a route id can never be passed where
//! a location id is expected. They serialize as bare integers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A node in the transport graph.
    LocationId(u32),
    "location"
);
id_type!(
    /// A directed edge in the transport graph.
    RouteId(u32),
    "route"
);
id_type!(ProductId(u32), "product");
id_type!(OrderId(u64), "order");
id_type!(DisruptionId(u64), "spike");
id_type!(
    /// The tenant every disruption, order and cooldown belongs to.
    PlayerId(u64),
    "player"
);

/// A game day. Day 1 is the first playable day.
pub type Day = u32;
