//! Disruptions ("spikes"): time-bounded, kind-tagged events.
//!
//! Each kind carries only the targets it needs plus the snapshot required to
//! undo it, as one variant of [`DisruptionEffect`]. Adding a kind means
//! adding a variant, and every `match` in the effect engine and router has
//! to acknowledge it.
//!
//! Lifecycle: `Scheduled` → `Active` → `Resolved(by)`. `Resolved` is terminal.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{LogisticsError, Result};
use crate::ids::{Day, DisruptionId, LocationId, OrderId, PlayerId, ProductId, RouteId};

/// The five spike kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionKind {
    Demand,
    Price,
    Delay,
    Breakdown,
    Blizzard,
}

/// Which records a kind mutates while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectScope {
    /// Mutates world-scoped records (`Route::is_active`, `Location::capacity`).
    /// Every player sees the change, not only the owner.
    Shared,
    /// Only the owner's view changes: cost surcharges, market multipliers,
    /// the owner's own orders.
    PlayerLocal,
}

impl DisruptionKind {
    pub fn all() -> &'static [DisruptionKind] {
        &[
            Self::Demand,
            Self::Price,
            Self::Delay,
            Self::Breakdown,
            Self::Blizzard,
        ]
    }

    pub fn scope(self) -> EffectScope {
        match self {
            Self::Breakdown | Self::Blizzard => EffectScope::Shared,
            Self::Demand | Self::Price | Self::Delay => EffectScope::PlayerLocal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Demand => "demand",
            Self::Price => "price",
            Self::Delay => "delay",
            Self::Breakdown => "breakdown",
            Self::Blizzard => "blizzard",
        }
    }
}

/// Pre-delay delivery schedule of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySnapshot {
    pub delivery_day: Option<Day>,
    pub delivery_date: Option<NaiveDate>,
}

/// Per-kind targets and rollback payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionEffect {
    Demand {
        product: Option<ProductId>,
    },
    Price {
        product: Option<ProductId>,
        /// Freight surcharge on one route for the owner.
        route: Option<RouteId>,
    },
    Delay {
        product: Option<ProductId>,
        /// Congestion surcharge on one route for the owner.
        route: Option<RouteId>,
        affected_orders: BTreeMap<OrderId, DeliverySnapshot>,
    },
    Breakdown {
        location: LocationId,
        original_capacity: Option<u32>,
    },
    Blizzard {
        route: RouteId,
    },
}

impl DisruptionEffect {
    pub fn kind(&self) -> DisruptionKind {
        match self {
            Self::Demand { .. } => DisruptionKind::Demand,
            Self::Price { .. } => DisruptionKind::Price,
            Self::Delay { .. } => DisruptionKind::Delay,
            Self::Breakdown { .. } => DisruptionKind::Breakdown,
            Self::Blizzard { .. } => DisruptionKind::Blizzard,
        }
    }

    pub fn target_route(&self) -> Option<RouteId> {
        match self {
            Self::Price { route, .. } | Self::Delay { route, .. } => *route,
            Self::Blizzard { route } => Some(*route),
            Self::Demand { .. } | Self::Breakdown { .. } => None,
        }
    }

    pub fn target_location(&self) -> Option<LocationId> {
        match self {
            Self::Breakdown { location, .. } => Some(*location),
            Self::Demand { .. } | Self::Price { .. } | Self::Delay { .. } | Self::Blizzard { .. } => {
                None
            }
        }
    }

    pub fn target_product(&self) -> Option<ProductId> {
        match self {
            Self::Demand { product } | Self::Price { product, .. } | Self::Delay { product, .. } => {
                *product
            }
            Self::Breakdown { .. } | Self::Blizzard { .. } => None,
        }
    }

    pub fn demand(product: Option<ProductId>) -> Self {
        Self::Demand { product }
    }

    pub fn price(product: Option<ProductId>, route: Option<RouteId>) -> Self {
        Self::Price { product, route }
    }

    pub fn delay(product: Option<ProductId>, route: Option<RouteId>) -> Self {
        Self::Delay {
            product,
            route,
            affected_orders: BTreeMap::new(),
        }
    }

    pub fn breakdown(location: LocationId) -> Self {
        Self::Breakdown {
            location,
            original_capacity: None,
        }
    }

    pub fn blizzard(route: RouteId) -> Self {
        Self::Blizzard { route }
    }
}

/// Who ended a spike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// Paid off early by the owner.
    Player,
    /// Reached `ends_at_day`.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Scheduled,
    Active,
    Resolved(ResolvedBy),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disruption {
    pub id: DisruptionId,
    pub owner: PlayerId,
    pub magnitude: f64,
    pub starts_at_day: Day,
    /// Exclusive.
    pub ends_at_day: Day,
    pub state: Lifecycle,
    pub is_guaranteed: bool,
    /// Cash needed to resolve early. Fixed when the spike is generated.
    pub resolution_cost: u64,
    pub headline: String,
    pub effect: DisruptionEffect,
}

impl Disruption {
    pub fn kind(&self) -> DisruptionKind {
        self.effect.kind()
    }

    pub fn is_active(&self) -> bool {
        self.state == Lifecycle::Active
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, Lifecycle::Resolved(_))
    }

    pub fn resolved_by(&self) -> Option<ResolvedBy> {
        match self.state {
            Lifecycle::Resolved(by) => Some(by),
            _ => None,
        }
    }

    /// Half-open interval check: `starts_at_day <= day < ends_at_day`.
    pub fn covers(&self, day: Day) -> bool {
        self.starts_at_day <= day && day < self.ends_at_day
    }

    pub fn duration_days(&self) -> u32 {
        self.ends_at_day.saturating_sub(self.starts_at_day)
    }

    /// Delays move deliveries by whole days.
    pub fn delay_days(&self) -> u32 {
        self.magnitude.max(0.0).round() as u32
    }
}

/// Everything a generator decides; the ledger assigns id and state.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDisruption {
    pub owner: PlayerId,
    pub magnitude: f64,
    pub starts_at_day: Day,
    pub ends_at_day: Day,
    pub is_guaranteed: bool,
    pub resolution_cost: u64,
    pub headline: String,
    pub effect: DisruptionEffect,
}

impl NewDisruption {
    /// A plain, non-guaranteed spike with no resolution cost.
    pub fn new(
        owner: PlayerId,
        effect: DisruptionEffect,
        magnitude: f64,
        starts_at_day: Day,
        ends_at_day: Day,
    ) -> Self {
        let headline = format!("{} spike", effect.kind().label());
        Self {
            owner,
            magnitude,
            starts_at_day,
            ends_at_day,
            is_guaranteed: false,
            resolution_cost: 0,
            headline,
            effect,
        }
    }

    pub fn with_resolution_cost(mut self, cost: u64) -> Self {
        self.resolution_cost = cost;
        self
    }

    pub fn guaranteed(mut self) -> Self {
        self.is_guaranteed = true;
        self
    }
}

/// Owns every spike in the game, across all players.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisruptionLedger {
    disruptions: Vec<Disruption>,
    next_id: u64,
    /// Bumped on every insert and lifecycle change.
    revision: u64,
}

impl DisruptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new spike in the `Scheduled` state.
    pub fn schedule(&mut self, draft: NewDisruption) -> DisruptionId {
        let id = DisruptionId(self.next_id);
        self.next_id += 1;
        self.disruptions.push(Disruption {
            id,
            owner: draft.owner,
            magnitude: draft.magnitude.max(0.0),
            starts_at_day: draft.starts_at_day,
            ends_at_day: draft.ends_at_day.max(draft.starts_at_day + 1),
            state: Lifecycle::Scheduled,
            is_guaranteed: draft.is_guaranteed,
            resolution_cost: draft.resolution_cost,
            headline: draft.headline,
            effect: draft.effect,
        });
        self.revision += 1;
        id
    }

    pub fn get(&self, id: DisruptionId) -> Result<&Disruption> {
        self.disruptions
            .iter()
            .find(|d| d.id == id)
            .ok_or(LogisticsError::UnknownDisruption(id))
    }

    /// Mutable access. Counts as a change for cache purposes.
    pub fn get_mut(&mut self, id: DisruptionId) -> Result<&mut Disruption> {
        self.revision += 1;
        self.disruptions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(LogisticsError::UnknownDisruption(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Disruption> {
        self.disruptions.iter()
    }

    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = &Disruption> {
        self.disruptions.iter().filter(move |d| d.owner == player)
    }

    /// Active spikes of one player.
    pub fn active_for(&self, player: PlayerId) -> impl Iterator<Item = &Disruption> {
        self.owned_by(player).filter(|d| d.is_active())
    }

    /// Active spikes of any player that target `route`.
    pub fn active_on_route(&self, route: RouteId) -> impl Iterator<Item = &Disruption> {
        self.disruptions
            .iter()
            .filter(move |d| d.is_active() && d.effect.target_route() == Some(route))
    }

    /// Scheduled spikes whose start day has arrived, oldest first.
    pub fn due_to_start(&self, day: Day) -> Vec<DisruptionId> {
        self.disruptions
            .iter()
            .filter(|d| d.state == Lifecycle::Scheduled && d.starts_at_day <= day)
            .map(|d| d.id)
            .collect()
    }

    /// Active spikes whose interval has closed.
    pub fn due_to_expire(&self, day: Day) -> Vec<DisruptionId> {
        self.disruptions
            .iter()
            .filter(|d| d.is_active() && d.ends_at_day <= day)
            .map(|d| d.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.disruptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disruptions.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
