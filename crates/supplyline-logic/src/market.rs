//! Demand and price multipliers read from active spikes.
//!
//! Demand and price spikes change nothing when applied. Economy code asks
//! here at evaluation time instead, so rollback is just the state change.

use crate::disruption::{DisruptionEffect, DisruptionLedger};
use crate::ids::{Day, PlayerId, ProductId};

fn multiplier(
    ledger: &DisruptionLedger,
    player: PlayerId,
    day: Day,
    matches: impl Fn(&DisruptionEffect) -> Option<Option<ProductId>>,
    product: ProductId,
) -> f64 {
    let total: f64 = ledger
        .active_for(player)
        .filter(|d| d.covers(day))
        .filter(|d| match matches(&d.effect) {
            Some(target) => target.map_or(true, |p| p == product),
            None => false,
        })
        .map(|d| d.magnitude)
        .sum();
    1.0 + total
}

/// `1 + Σ magnitude` of the player's active demand spikes for `product`.
/// Spikes without a product apply to everything.
pub fn demand_multiplier(
    ledger: &DisruptionLedger,
    player: PlayerId,
    product: ProductId,
    day: Day,
) -> f64 {
    multiplier(
        ledger,
        player,
        day,
        |effect| match effect {
            DisruptionEffect::Demand { product } => Some(*product),
            _ => None,
        },
        product,
    )
}

/// Same as [`demand_multiplier`] for purchase prices.
pub fn price_multiplier(
    ledger: &DisruptionLedger,
    player: PlayerId,
    product: ProductId,
    day: Day,
) -> f64 {
    multiplier(
        ledger,
        player,
        day,
        |effect| match effect {
            DisruptionEffect::Price { product, .. } => Some(*product),
            _ => None,
        },
        product,
    )
}
