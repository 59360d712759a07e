//! Applying and undoing spikes.
//!
//! `apply` runs on Scheduled → Active, `rollback` on Active → Resolved. The
//! lifecycle state is the only guard against double application: applying a
//! spike that is not Scheduled, or rolling back one that is not Active, is a
//! programming error and returns [`LogisticsError::InvalidTransition`].
//!
//! Rollback never recomputes an original value. Whatever apply overwrote is
//! snapshotted into the spike's effect payload and written back verbatim.
//!
//! | Kind | Apply | Rollback |
//! |------|-------|----------|
//! | breakdown | capacity := round(original × magnitude) | capacity := snapshot |
//! | blizzard | route inactive for everyone | route active unless another blizzard holds it |
//! | demand, price | flag only | flag only |
//! | delay | owner's moving orders postponed by magnitude days | snapshots restored |
//!
//! An order is held by at most one active delay, so delay snapshots never
//! nest and rollback order does not matter.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::disruption::{
    DeliverySnapshot, Disruption, DisruptionEffect, DisruptionKind, DisruptionLedger, Lifecycle,
    ResolvedBy,
};
use crate::error::{LogisticsError, Result};
use crate::ids::{DisruptionId, OrderId, PlayerId};
use crate::network::Network;
use crate::orders::OrderBook;

/// A payment the cash ledger refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitDeclined {
    pub player: PlayerId,
    pub amount: u64,
    pub reason: String,
}

impl fmt::Display for DebitDeclined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cannot pay {}: {}", self.player, self.amount, self.reason)
    }
}

/// Player cash, owned by the economy outside this crate.
pub trait CashLedger {
    fn debit(&mut self, player: PlayerId, amount: u64) -> std::result::Result<(), DebitDeclined>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EarlyResolution {
    Resolved { cost: u64 },
    /// Nothing changed; the spike is still active.
    Declined(DebitDeclined),
}

/// Borrows the world pieces a transition may touch for the length of one
/// operation.
pub struct EffectEngine<'a> {
    network: &'a mut Network,
    ledger: &'a mut DisruptionLedger,
    orders: &'a mut dyn OrderBook,
}

impl<'a> EffectEngine<'a> {
    pub fn new(
        network: &'a mut Network,
        ledger: &'a mut DisruptionLedger,
        orders: &'a mut dyn OrderBook,
    ) -> Self {
        Self {
            network,
            ledger,
            orders,
        }
    }

    /// Scheduled → Active.
    pub fn apply(&mut self, id: DisruptionId) -> Result<()> {
        let spike = self.ledger.get(id)?;
        if spike.state != Lifecycle::Scheduled {
            return Err(LogisticsError::InvalidTransition {
                id,
                action: "apply",
                state: spike.state,
            });
        }
        let owner = spike.owner;
        let magnitude = spike.magnitude;
        let delay_days = spike.delay_days();

        let applied = match spike.effect.clone() {
            DisruptionEffect::Breakdown { location, .. } => {
                let original = self.network.location(location)?.capacity;
                let reduced = (original as f64 * magnitude).round() as u32;
                self.network.set_location_capacity(location, reduced)?;
                log::info!("Breakdown at {location}: capacity {original} -> {reduced}");
                DisruptionEffect::Breakdown {
                    location,
                    original_capacity: Some(original),
                }
            }
            DisruptionEffect::Blizzard { route } => {
                self.network.set_route_active(route, false)?;
                log::info!("Blizzard closes {route} for every player");
                DisruptionEffect::Blizzard { route }
            }
            effect @ (DisruptionEffect::Demand { .. } | DisruptionEffect::Price { .. }) => {
                if let Some(route) = effect.target_route() {
                    self.network.route(route)?;
                }
                effect
            }
            DisruptionEffect::Delay { product, route, .. } => {
                if let Some(route) = route {
                    self.network.route(route)?;
                }
                let held = orders_held_by_other_delays(self.ledger, id);
                let mut affected_orders = BTreeMap::new();
                for order_id in self.orders.order_ids_for(owner) {
                    if held.contains(&order_id) {
                        log::debug!("{order_id} already held by another delay, skipping");
                        continue;
                    }
                    let Some(order) = self.orders.order_mut(order_id) else {
                        continue;
                    };
                    if !order.is_delayable() || product.is_some_and(|p| !order.contains(p)) {
                        continue;
                    }
                    affected_orders.insert(
                        order_id,
                        DeliverySnapshot {
                            delivery_day: order.delivery_day,
                            delivery_date: order.delivery_date,
                        },
                    );
                    order.postpone(delay_days);
                }
                log::info!(
                    "Delay for {owner}: {} orders pushed back {delay_days} days",
                    affected_orders.len()
                );
                DisruptionEffect::Delay {
                    product,
                    route,
                    affected_orders,
                }
            }
        };

        let spike = self.ledger.get_mut(id)?;
        spike.effect = applied;
        spike.state = Lifecycle::Active;
        log::info!("Spike {id} active: {}", spike.headline);
        Ok(())
    }

    /// Active → Resolved(by), restoring whatever apply changed.
    pub fn rollback(&mut self, id: DisruptionId, by: ResolvedBy) -> Result<()> {
        let spike = self.ledger.get(id)?;
        if spike.state != Lifecycle::Active {
            return Err(LogisticsError::InvalidTransition {
                id,
                action: "roll back",
                state: spike.state,
            });
        }
        self.check_restorable(spike)?;

        match &spike.effect {
            DisruptionEffect::Breakdown {
                location,
                original_capacity,
            } => {
                let original = original_capacity.ok_or(LogisticsError::MissingSnapshot(id))?;
                self.network.set_location_capacity(*location, original)?;
            }
            DisruptionEffect::Blizzard { route } => {
                let still_blocked = self
                    .ledger
                    .active_on_route(*route)
                    .any(|other| other.id != id && other.kind() == DisruptionKind::Blizzard);
                if still_blocked {
                    log::debug!("{route} stays closed, another blizzard is still active");
                } else {
                    self.network.set_route_active(*route, true)?;
                }
            }
            DisruptionEffect::Demand { .. } | DisruptionEffect::Price { .. } => {}
            DisruptionEffect::Delay {
                affected_orders, ..
            } => {
                for (order_id, snapshot) in affected_orders {
                    match self.orders.order_mut(*order_id) {
                        Some(order) => {
                            order.delivery_day = snapshot.delivery_day;
                            order.delivery_date = snapshot.delivery_date;
                        }
                        None => log::warn!("{order_id} vanished before {id} was rolled back"),
                    }
                }
            }
        }

        let spike = self.ledger.get_mut(id)?;
        spike.state = Lifecycle::Resolved(by);
        log::info!("Spike {id} resolved by {by:?}");
        Ok(())
    }

    /// Natural end at `ends_at_day`.
    pub fn expire(&mut self, id: DisruptionId) -> Result<()> {
        self.rollback(id, ResolvedBy::Time)
    }

    /// Pay the spike's fixed cost and roll it back. A refused payment leaves
    /// the spike active and the world untouched.
    pub fn resolve_early(
        &mut self,
        id: DisruptionId,
        cash: &mut dyn CashLedger,
    ) -> Result<EarlyResolution> {
        let spike = self.ledger.get(id)?;
        if spike.state != Lifecycle::Active {
            return Err(LogisticsError::InvalidTransition {
                id,
                action: "resolve",
                state: spike.state,
            });
        }
        self.check_restorable(spike)?;
        let (owner, cost) = (spike.owner, spike.resolution_cost);
        if let Err(declined) = cash.debit(owner, cost) {
            log::info!("Early resolution of {id} declined: {declined}");
            return Ok(EarlyResolution::Declined(declined));
        }
        self.rollback(id, ResolvedBy::Player)?;
        Ok(EarlyResolution::Resolved { cost })
    }

    /// Everything rollback needs is present: the snapshot and the target.
    fn check_restorable(&self, spike: &Disruption) -> Result<()> {
        match &spike.effect {
            DisruptionEffect::Breakdown {
                location,
                original_capacity,
            } => {
                original_capacity.ok_or(LogisticsError::MissingSnapshot(spike.id))?;
                self.network.location(*location)?;
            }
            DisruptionEffect::Blizzard { route } => {
                self.network.route(*route)?;
            }
            DisruptionEffect::Demand { .. }
            | DisruptionEffect::Price { .. }
            | DisruptionEffect::Delay { .. } => {}
        }
        Ok(())
    }
}

/// Orders snapshotted by active delays other than `id`.
fn orders_held_by_other_delays(ledger: &DisruptionLedger, id: DisruptionId) -> BTreeSet<OrderId> {
    ledger
        .iter()
        .filter(|d| d.is_active() && d.id != id)
        .filter_map(|d| match &d.effect {
            DisruptionEffect::Delay {
                affected_orders, ..
            } => Some(affected_orders.keys().copied()),
            _ => None,
        })
        .flatten()
        .collect()
}
