//! Integration tests for the full spike lifecycle.
//!
//! Exercises: generation → constraint checks → apply → routing / market
//! reads → rollback, for every kind, against one small bakery network.
//!
//! All tests are pure logic, no engine or locking.

use std::collections::HashMap;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;

use supplyline_logic::config::GameConfig;
use supplyline_logic::constraints::{record_spike_started, ConstraintChecker, CooldownMap};
use supplyline_logic::disruption::{
    DisruptionEffect, DisruptionKind, DisruptionLedger, Lifecycle, NewDisruption, ResolvedBy,
};
use supplyline_logic::effects::{CashLedger, DebitDeclined, EarlyResolution, EffectEngine};
use supplyline_logic::generator::{DisruptionGenerator, GenerationContext};
use supplyline_logic::ids::{LocationId, PlayerId, ProductId, RouteId};
use supplyline_logic::market::{demand_multiplier, price_multiplier};
use supplyline_logic::network::{LocationKind, Network, RouteSpec};
use supplyline_logic::orders::{LineItem, OrderLedger, OrderStatus};
use supplyline_logic::routing::{reachable, Router};

// ── Helpers ────────────────────────────────────────────────────────────

const ALICE: PlayerId = PlayerId(1);
const BOB: PlayerId = PlayerId(2);
const FLOUR: ProductId = ProductId(10);

struct Bakery {
    network: Network,
    ledger: DisruptionLedger,
    orders: OrderLedger,
    mill: LocationId,
    depot: LocationId,
    shop: LocationId,
    mill_depot: RouteId,
    depot_shop: RouteId,
}

/// Mill -> Depot -> Shop, plus a pricey direct Mill -> Shop lane.
fn bakery() -> Bakery {
    let mut network = Network::new();
    let mill = network.add_location("Mill", LocationKind::Vendor, 800);
    let depot = network.add_location("Depot", LocationKind::Hub, 1000);
    let shop = network.add_location("Shop", LocationKind::Store, 120);
    let mill_depot = network
        .add_route(RouteSpec::new(mill, depot, "truck", 10.0).weather_vulnerable())
        .unwrap();
    let depot_shop = network
        .add_route(RouteSpec::new(depot, shop, "van", 5.0).with_transit_days(2))
        .unwrap();
    network
        .add_route(RouteSpec::new(mill, shop, "air", 60.0))
        .unwrap();
    Bakery {
        network,
        ledger: DisruptionLedger::new(),
        orders: OrderLedger::new(),
        mill,
        depot,
        shop,
        mill_depot,
        depot_shop,
    }
}

impl Bakery {
    fn engine(&mut self) -> EffectEngine<'_> {
        EffectEngine::new(&mut self.network, &mut self.ledger, &mut self.orders)
    }
}

struct Purse(HashMap<PlayerId, u64>);

impl CashLedger for Purse {
    fn debit(&mut self, player: PlayerId, amount: u64) -> Result<(), DebitDeclined> {
        let balance = self.0.entry(player).or_default();
        if *balance < amount {
            return Err(DebitDeclined {
                player,
                amount,
                reason: "short of cash".into(),
            });
        }
        *balance -= amount;
        Ok(())
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, day).unwrap()
}

// ── Round trips ────────────────────────────────────────────────────────

#[test]
fn every_kind_round_trips_to_the_original_state() {
    let mut world = bakery();
    world.orders.place(
        ALICE,
        OrderStatus::InTransit,
        Some(5),
        Some(date(5)),
        vec![LineItem { product: FLOUR, quantity: 40 }],
    );
    world
        .orders
        .place(ALICE, OrderStatus::Pending, Some(7), Some(date(7)), vec![]);

    let locations = world.network.locations().to_vec();
    let routes = world.network.routes().to_vec();
    let orders: Vec<_> = world.orders.iter().cloned().collect();

    let effects = [
        DisruptionEffect::demand(Some(FLOUR)),
        DisruptionEffect::price(Some(FLOUR), Some(world.depot_shop)),
        DisruptionEffect::delay(None, None),
        DisruptionEffect::breakdown(world.depot),
        DisruptionEffect::blizzard(world.mill_depot),
    ];
    for effect in effects {
        let kind = effect.kind();
        let magnitude = if kind == DisruptionKind::Delay { 2.0 } else { 0.4 };
        let id = world
            .ledger
            .schedule(NewDisruption::new(ALICE, effect, magnitude, 2, 4));
        world.engine().apply(id).unwrap();
        world.engine().expire(id).unwrap();

        assert_eq!(world.network.locations(), locations.as_slice(), "{kind:?}");
        assert_eq!(world.network.routes(), routes.as_slice(), "{kind:?}");
        let after: Vec<_> = world.orders.iter().cloned().collect();
        assert_eq!(after, orders, "{kind:?}");
        assert_eq!(
            world.ledger.get(id).unwrap().state,
            Lifecycle::Resolved(ResolvedBy::Time)
        );
    }
}

#[test]
fn breakdown_halves_then_restores_depot() {
    let mut world = bakery();
    let depot = world.depot;
    let id = world
        .ledger
        .schedule(NewDisruption::new(ALICE, DisruptionEffect::breakdown(depot), 0.5, 3, 5));
    world.engine().apply(id).unwrap();
    assert_eq!(world.network.location(depot).unwrap().capacity, 500);
    world.engine().rollback(id, ResolvedBy::Time).unwrap();
    assert_eq!(world.network.location(depot).unwrap().capacity, 1000);
}

// ── Cross-module behaviour ─────────────────────────────────────────────

#[test]
fn blizzard_cuts_off_the_depot_for_every_player() {
    let mut world = bakery();
    let (mill, depot, shop) = (world.mill, world.depot, world.shop);
    let id = world.ledger.schedule(NewDisruption::new(
        ALICE,
        DisruptionEffect::blizzard(world.mill_depot),
        1.0,
        2,
        3,
    ));
    world.engine().apply(id).unwrap();

    assert!(!reachable(&world.network, depot).unwrap());
    let mut router = Router::new();
    let bob = router
        .best_path(&world.network, &world.ledger, mill, shop, BOB)
        .unwrap()
        .unwrap();
    assert_eq!(bob.hops(), 1, "only the air lane is left");

    world.engine().expire(id).unwrap();
    assert!(reachable(&world.network, depot).unwrap());
    let bob = router
        .best_path(&world.network, &world.ledger, mill, shop, BOB)
        .unwrap()
        .unwrap();
    assert_eq!(bob.hops(), 2);
}

#[test]
fn price_spike_reroutes_only_its_owner_until_resolved_early() {
    let mut world = bakery();
    let (mill, shop) = (world.mill, world.shop);
    let id = world.ledger.schedule(
        NewDisruption::new(
            ALICE,
            DisruptionEffect::price(Some(FLOUR), Some(world.depot_shop)),
            12.0,
            2,
            6,
        )
        .with_resolution_cost(300),
    );
    world.engine().apply(id).unwrap();
    assert_eq!(price_multiplier(&world.ledger, ALICE, FLOUR, 3), 13.0);
    assert_eq!(demand_multiplier(&world.ledger, ALICE, FLOUR, 3), 1.0);

    let mut router = Router::new();
    let alice = router
        .best_path(&world.network, &world.ledger, mill, shop, ALICE)
        .unwrap()
        .unwrap();
    assert_eq!(alice.hops(), 1);
    assert_eq!(alice.effective_cost, 60.0);
    let bob = router
        .best_path(&world.network, &world.ledger, mill, shop, BOB)
        .unwrap()
        .unwrap();
    assert_eq!(bob.effective_cost, 15.0);

    let mut purse = Purse(HashMap::from([(ALICE, 100)]));
    let declined = world.engine().resolve_early(id, &mut purse).unwrap();
    assert!(matches!(declined, EarlyResolution::Declined(_)));
    assert!(world.ledger.get(id).unwrap().is_active());

    purse.0.insert(ALICE, 1000);
    let resolved = world.engine().resolve_early(id, &mut purse).unwrap();
    assert_eq!(resolved, EarlyResolution::Resolved { cost: 300 });
    assert_eq!(purse.0[&ALICE], 700);

    let alice = router
        .best_path(&world.network, &world.ledger, mill, shop, ALICE)
        .unwrap()
        .unwrap();
    assert_eq!(alice.hops(), 2);
    assert_eq!(alice.effective_cost, 15.0);
}

#[test]
fn generated_spikes_respect_constraints_over_a_season() {
    let mut world = bakery();
    let config = GameConfig::default();
    let generator = DisruptionGenerator::new(&config);
    let products = [FLOUR];
    let mut cooldowns = CooldownMap::new();
    let mut rng = StdRng::seed_from_u64(7);

    for day in 1..=40 {
        let ctx = GenerationContext {
            network: &world.network,
            cooldowns: &cooldowns,
            products: &products,
        };
        let spike =
            generator.generate_guaranteed(&mut world.ledger, &ctx, ALICE, day, &mut rng);
        if day == 1 {
            assert!(spike.is_none());
        }
        if let Some(spike) = spike {
            assert!(spike.is_guaranteed);
            assert_eq!(spike.state, Lifecycle::Scheduled);
        }

        for id in world.ledger.due_to_expire(day) {
            world.engine().expire(id).unwrap();
        }
        for id in world.ledger.due_to_start(day) {
            let kind = world.ledger.get(id).unwrap().kind();
            world.engine().apply(id).unwrap();
            record_spike_started(&mut cooldowns, kind, day);
        }

        let covering = ConstraintChecker::new(&world.ledger).covering_count(ALICE, day);
        assert!(covering <= config.guaranteed_cap, "day {day}: {covering} spikes");
    }
}
