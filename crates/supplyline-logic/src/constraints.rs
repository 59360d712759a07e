//! Scheduling constraints for new spikes.
//!
//! Three rules keep the chaos readable for a player:
//! - a cap on how many spikes may cover the same day,
//! - a cooldown per kind since it last started,
//! - no two spikes of the same kind starting within the window of each other.
//!
//! When cooldowns and overlaps rule out every kind, generation falls back to
//! the full kind set so the game never goes quiet.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::disruption::{DisruptionKind, DisruptionLedger};
use crate::ids::{Day, PlayerId};

/// Default same-kind spacing in days.
pub const DEFAULT_WINDOW: u32 = 2;

/// `kind -> last day a spike of that kind started` for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownMap(BTreeMap<DisruptionKind, Day>);

impl CooldownMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_started(&self, kind: DisruptionKind) -> Option<Day> {
        self.0.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DisruptionKind, Day)> + '_ {
        self.0.iter().map(|(k, d)| (*k, *d))
    }
}

/// Merge `kind -> day` into the map, leaving other kinds alone.
pub fn record_spike_started(cooldowns: &mut CooldownMap, kind: DisruptionKind, day: Day) {
    cooldowns.0.insert(kind, day);
}

/// Read-only rule evaluation over one ledger.
pub struct ConstraintChecker<'a> {
    ledger: &'a DisruptionLedger,
    window: u32,
}

impl<'a> ConstraintChecker<'a> {
    pub fn new(ledger: &'a DisruptionLedger) -> Self {
        Self {
            ledger,
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// Scheduled or active spikes of `player` whose `[start, end)` holds `day`.
    pub fn covering_count(&self, player: PlayerId, day: Day) -> usize {
        self.ledger
            .owned_by(player)
            .filter(|d| !d.is_resolved() && d.covers(day))
            .count()
    }

    /// A new spike must never be the one that brings the count to `cap`.
    pub fn can_schedule(&self, player: PlayerId, day: Day, cap: usize) -> bool {
        self.covering_count(player, day) < cap
    }

    /// Kinds not blocked by a cooldown or a nearby same-kind spike. May be empty.
    pub fn allowed_kinds(
        &self,
        player: PlayerId,
        day: Day,
        cooldowns: &CooldownMap,
    ) -> BTreeSet<DisruptionKind> {
        DisruptionKind::all()
            .iter()
            .copied()
            .filter(|kind| {
                let cooling = cooldowns
                    .last_started(*kind)
                    .is_some_and(|last| last.abs_diff(day) <= self.window);
                let crowded = self.ledger.owned_by(player).any(|d| {
                    d.kind() == *kind
                        && !d.is_resolved()
                        && d.starts_at_day.abs_diff(day) <= self.window
                });
                !cooling && !crowded
            })
            .collect()
    }

    /// `allowed_kinds`, or every kind when that comes back empty.
    pub fn generatable_kinds(
        &self,
        player: PlayerId,
        day: Day,
        cooldowns: &CooldownMap,
    ) -> BTreeSet<DisruptionKind> {
        let allowed = self.allowed_kinds(player, day, cooldowns);
        if allowed.is_empty() {
            log::debug!("{player}: every kind is cooling down on day {day}, using full set");
            DisruptionKind::all().iter().copied().collect()
        } else {
            allowed
        }
    }
}
