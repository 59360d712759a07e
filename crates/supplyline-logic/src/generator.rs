//! Spike generation — guaranteed daily pressure plus random extras.
//!
//! Both paths share the same target resolution:
//! - blizzard: an active, weather-vulnerable route
//! - breakdown: a location with no breakdown already pending or active
//! - demand / price / delay: optionally a product; price and delay may also
//!   pick an active route to surcharge
//!
//! A kind with no valid target is skipped, never an error. New spikes are
//! stored in the ledger as `Scheduled`; applying them is the effect engine's
//! job.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{GameConfig, KindTuning};
use crate::constraints::{ConstraintChecker, CooldownMap};
use crate::disruption::{Disruption, DisruptionEffect, DisruptionKind, DisruptionLedger, NewDisruption};
use crate::ids::{Day, PlayerId, ProductId};
use crate::network::Network;

/// World data a generator may pick targets from.
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    pub network: &'a Network,
    pub cooldowns: &'a CooldownMap,
    /// Products that demand, price and delay spikes may single out.
    pub products: &'a [ProductId],
}

pub struct DisruptionGenerator<'a> {
    config: &'a GameConfig,
}

impl<'a> DisruptionGenerator<'a> {
    pub fn new(config: &'a GameConfig) -> Self {
        Self { config }
    }

    /// The daily guaranteed spike.
    ///
    /// Nothing during the tutorial grace period or when the player is already
    /// at the guaranteed cap for `day`. Otherwise tries the generatable kinds
    /// in weighted random order and schedules the first one with a target.
    pub fn generate_guaranteed(
        &self,
        ledger: &mut DisruptionLedger,
        ctx: &GenerationContext<'_>,
        player: PlayerId,
        day: Day,
        rng: &mut impl Rng,
    ) -> Option<Disruption> {
        if day <= self.config.tutorial_grace_day {
            return None;
        }
        let checker = ConstraintChecker::new(ledger).with_window(self.config.cooldown_window);
        if !checker.can_schedule(player, day, self.config.guaranteed_cap) {
            log::debug!("{player}: guaranteed cap reached on day {day}");
            return None;
        }
        let kinds = checker.generatable_kinds(player, day, ctx.cooldowns);
        let draft = self.first_resolvable(kinds, ctx, ledger, player, day, rng)?;
        self.store(ledger, draft.guaranteed())
    }

    /// Opportunistic spike. Fires with `spawn_chance` unless `force_kind` is
    /// given, in which case the roll and the kind filter are skipped. The
    /// opportunistic cap always applies.
    pub fn generate(
        &self,
        ledger: &mut DisruptionLedger,
        ctx: &GenerationContext<'_>,
        player: PlayerId,
        day: Day,
        force_kind: Option<DisruptionKind>,
        rng: &mut impl Rng,
    ) -> Option<Disruption> {
        let checker = ConstraintChecker::new(ledger).with_window(self.config.cooldown_window);
        if !checker.can_schedule(player, day, self.config.opportunistic_cap) {
            return None;
        }

        let draft = match force_kind {
            Some(kind) => {
                let draft = self.draft(kind, ctx, ledger, player, day, rng);
                if draft.is_none() {
                    log::debug!("{player}: forced {} has no target on day {day}", kind.label());
                }
                draft?
            }
            None => {
                if !rng.gen_bool(self.config.spawn_chance) {
                    return None;
                }
                let kinds = checker.generatable_kinds(player, day, ctx.cooldowns);
                self.first_resolvable(kinds, ctx, ledger, player, day, rng)?
            }
        };
        self.store(ledger, draft)
    }

    fn store(&self, ledger: &mut DisruptionLedger, draft: NewDisruption) -> Option<Disruption> {
        let id = ledger.schedule(draft);
        let stored = ledger.get(id).ok()?.clone();
        log::info!(
            "Spike {} scheduled for {}: {} magnitude={:.2} days {}..{}{}",
            stored.id,
            stored.owner,
            stored.kind().label(),
            stored.magnitude,
            stored.starts_at_day,
            stored.ends_at_day,
            if stored.is_guaranteed { " (guaranteed)" } else { "" }
        );
        Some(stored)
    }

    fn first_resolvable(
        &self,
        kinds: BTreeSet<DisruptionKind>,
        ctx: &GenerationContext<'_>,
        ledger: &DisruptionLedger,
        player: PlayerId,
        day: Day,
        rng: &mut impl Rng,
    ) -> Option<NewDisruption> {
        self.weighted_order(kinds, rng)
            .into_iter()
            .find_map(|kind| self.draft(kind, ctx, ledger, player, day, rng))
    }

    /// Weighted shuffle: repeatedly draw by weight without replacement.
    fn weighted_order(&self, kinds: BTreeSet<DisruptionKind>, rng: &mut impl Rng) -> Vec<DisruptionKind> {
        let mut remaining: Vec<DisruptionKind> = kinds.into_iter().collect();
        let mut ordered = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let picked = remaining
                .choose_weighted(rng, |kind| self.config.tuning(*kind).weight)
                .or_else(|_| remaining.choose(rng).ok_or(()))
                .copied();
            let Ok(kind) = picked else { break };
            remaining.retain(|k| *k != kind);
            ordered.push(kind);
        }
        ordered
    }

    fn draft(
        &self,
        kind: DisruptionKind,
        ctx: &GenerationContext<'_>,
        ledger: &DisruptionLedger,
        player: PlayerId,
        day: Day,
        rng: &mut impl Rng,
    ) -> Option<NewDisruption> {
        let effect = self.resolve_target(kind, ctx, ledger, rng)?;
        let tuning = self.config.tuning(kind);
        let magnitude = roll_magnitude(kind, &tuning, rng);
        let duration = if tuning.min_duration < tuning.max_duration {
            rng.gen_range(tuning.min_duration..=tuning.max_duration)
        } else {
            tuning.min_duration.max(1)
        };
        let cost = (tuning.base_resolution_cost as f64 * (1.0 + magnitude)).round() as u64;
        let headline = headline(&effect, ctx.network);

        let mut draft = NewDisruption::new(player, effect, magnitude, day, day + duration)
            .with_resolution_cost(cost);
        draft.headline = headline;
        Some(draft)
    }

    fn resolve_target(
        &self,
        kind: DisruptionKind,
        ctx: &GenerationContext<'_>,
        ledger: &DisruptionLedger,
        rng: &mut impl Rng,
    ) -> Option<DisruptionEffect> {
        let network = ctx.network;
        match kind {
            DisruptionKind::Blizzard => {
                let exposed: Vec<_> = network
                    .active_routes()
                    .filter(|r| r.weather_vulnerable)
                    .map(|r| r.id)
                    .collect();
                exposed.choose(rng).map(|r| DisruptionEffect::blizzard(*r))
            }
            DisruptionKind::Breakdown => {
                // One breakdown per location at a time, so snapshots nest.
                let idle: Vec<_> = network
                    .locations()
                    .iter()
                    .map(|l| l.id)
                    .filter(|id| {
                        !ledger
                            .iter()
                            .any(|d| !d.is_resolved() && d.effect.target_location() == Some(*id))
                    })
                    .collect();
                idle.choose(rng).map(|id| DisruptionEffect::breakdown(*id))
            }
            DisruptionKind::Demand => Some(DisruptionEffect::demand(ctx.products.choose(rng).copied())),
            DisruptionKind::Price | DisruptionKind::Delay => {
                let product = ctx.products.choose(rng).copied();
                let route = if rng.gen_bool(self.config.route_target_chance) {
                    let active: Vec<_> = network.active_routes().map(|r| r.id).collect();
                    active.choose(rng).copied()
                } else {
                    None
                };
                Some(if kind == DisruptionKind::Price {
                    DisruptionEffect::price(product, route)
                } else {
                    DisruptionEffect::delay(product, route)
                })
            }
        }
    }
}

fn roll_magnitude(kind: DisruptionKind, tuning: &KindTuning, rng: &mut impl Rng) -> f64 {
    let raw = if tuning.min_magnitude < tuning.max_magnitude {
        rng.gen_range(tuning.min_magnitude..=tuning.max_magnitude)
    } else {
        tuning.min_magnitude
    };
    match kind {
        DisruptionKind::Delay => raw.round().max(1.0),
        _ => (raw * 100.0).round() / 100.0,
    }
}

fn headline(effect: &DisruptionEffect, network: &Network) -> String {
    let place = |id| {
        network
            .location(id)
            .map(|l| l.name.clone())
            .unwrap_or_else(|_| id.to_string())
    };
    match effect {
        DisruptionEffect::Blizzard { route } => match network.route(*route) {
            Ok(r) => format!(
                "Blizzard closes the {} lane {} to {}",
                r.transport_mode,
                place(r.source),
                place(r.target)
            ),
            Err(_) => format!("Blizzard closes {route}"),
        },
        DisruptionEffect::Breakdown { location, .. } => {
            format!("Equipment breakdown at {}", place(*location))
        }
        DisruptionEffect::Demand { .. } => "Demand surge".to_string(),
        DisruptionEffect::Price { .. } => "Supplier price hike".to_string(),
        DisruptionEffect::Delay { .. } => "Delivery delays".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::record_spike_started;
    use crate::disruption::Lifecycle;
    use crate::network::{LocationKind, RouteSpec};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALICE: PlayerId = PlayerId(1);

    fn network(with_vulnerable: bool) -> Network {
        let mut net = Network::new();
        let mill = net.add_location("Mill", LocationKind::Vendor, 800);
        let depot = net.add_location("Depot", LocationKind::Warehouse, 1200);
        let shop = net.add_location("Shop", LocationKind::Store, 80);
        let road = RouteSpec::new(mill, depot, "truck", 10.0);
        net.add_route(if with_vulnerable { road.weather_vulnerable() } else { road })
            .unwrap();
        net.add_route(RouteSpec::new(depot, shop, "truck", 4.0)).unwrap();
        net
    }

    #[test]
    fn test_guaranteed_skips_grace_day() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert!(gen.generate_guaranteed(&mut ledger, &ctx, ALICE, 1, &mut rng).is_none());
        }
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_guaranteed_schedules_allowed_kind() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let mut cooldowns = CooldownMap::new();
        record_spike_started(&mut cooldowns, DisruptionKind::Blizzard, 4);
        record_spike_started(&mut cooldowns, DisruptionKind::Demand, 5);
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[ProductId(3)] };

        for seed in 0..50 {
            let mut ledger = DisruptionLedger::new();
            let mut rng = StdRng::seed_from_u64(seed);
            let spike = gen
                .generate_guaranteed(&mut ledger, &ctx, ALICE, 5, &mut rng)
                .expect("a guaranteed spike on day 5");
            assert_eq!(spike.state, Lifecycle::Scheduled);
            assert!(spike.is_guaranteed);
            assert_eq!(spike.starts_at_day, 5);
            assert!(spike.ends_at_day > 5);
            assert!(
                !matches!(spike.kind(), DisruptionKind::Blizzard | DisruptionKind::Demand),
                "seed {seed} picked a cooling kind {:?}",
                spike.kind()
            );
        }
    }

    #[test]
    fn test_guaranteed_respects_cap() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(7);

        let first = gen.generate_guaranteed(&mut ledger, &ctx, ALICE, 3, &mut rng);
        let second = gen.generate_guaranteed(&mut ledger, &ctx, ALICE, 3, &mut rng);
        let third = gen.generate_guaranteed(&mut ledger, &ctx, ALICE, 3, &mut rng);
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none(), "cap of 2 covering spikes");
        assert_eq!(ConstraintChecker::new(&ledger).covering_count(ALICE, 3), 2);
    }

    #[test]
    fn test_forced_blizzard_without_target_is_none() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(false);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(3);
        let spike = gen.generate(&mut ledger, &ctx, ALICE, 4, Some(DisruptionKind::Blizzard), &mut rng);
        assert!(spike.is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_forced_blizzard_targets_vulnerable_route() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(3);
        let spike = gen
            .generate(&mut ledger, &ctx, ALICE, 4, Some(DisruptionKind::Blizzard), &mut rng)
            .unwrap();
        let route = spike.effect.target_route().unwrap();
        assert!(net.route(route).unwrap().weather_vulnerable);
        assert!(!spike.is_guaranteed);
        assert!(spike.headline.contains("Mill"));
    }

    #[test]
    fn test_breakdowns_never_stack_on_one_location() {
        let config = GameConfig {
            opportunistic_cap: 10,
            ..GameConfig::default()
        };
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(5);

        let mut hit = BTreeSet::new();
        for _ in 0..net.location_count() {
            let spike = gen
                .generate(&mut ledger, &ctx, ALICE, 4, Some(DisruptionKind::Breakdown), &mut rng)
                .unwrap();
            assert!(hit.insert(spike.effect.target_location().unwrap()));
        }
        assert!(gen
            .generate(&mut ledger, &ctx, ALICE, 4, Some(DisruptionKind::Breakdown), &mut rng)
            .is_none());
    }

    #[test]
    fn test_spawn_chance_zero_never_fires_unforced() {
        let config = GameConfig {
            spawn_chance: 0.0,
            ..GameConfig::default()
        };
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[] };
        let mut ledger = DisruptionLedger::new();
        let mut rng = StdRng::seed_from_u64(11);
        for day in 2..30 {
            assert!(gen.generate(&mut ledger, &ctx, ALICE, day, None, &mut rng).is_none());
        }
        // A forced kind still goes through.
        assert!(gen
            .generate(&mut ledger, &ctx, ALICE, 30, Some(DisruptionKind::Demand), &mut rng)
            .is_some());
    }

    #[test]
    fn test_rolled_values_within_tuning() {
        let config = GameConfig::default();
        let gen = DisruptionGenerator::new(&config);
        let net = network(true);
        let cooldowns = CooldownMap::new();
        let ctx = GenerationContext { network: &net, cooldowns: &cooldowns, products: &[ProductId(1)] };
        let mut rng = StdRng::seed_from_u64(99);

        for kind in DisruptionKind::all() {
            for _ in 0..20 {
                let mut ledger = DisruptionLedger::new();
                let spike = gen
                    .generate(&mut ledger, &ctx, ALICE, 10, Some(*kind), &mut rng)
                    .unwrap();
                let t = config.tuning(*kind);
                assert!(spike.magnitude >= t.min_magnitude - 0.01);
                assert!(spike.magnitude <= t.max_magnitude + 0.01);
                let duration = spike.duration_days();
                assert!(duration >= t.min_duration && duration <= t.max_duration);
                assert!(spike.resolution_cost >= t.base_resolution_cost);
                if *kind == DisruptionKind::Delay {
                    assert_eq!(spike.magnitude.fract(), 0.0);
                }
            }
        }
    }
}
