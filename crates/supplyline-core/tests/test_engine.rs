//! Integration tests for the engine facade: routing under spikes, multiple
//! players, concurrent readers and save/load.

use std::sync::Arc;
use std::thread;

use supplyline_core::persistence::SaveError;
use supplyline_core::prelude::*;
use supplyline_logic::config::GameConfig;
use supplyline_logic::disruption::{DisruptionKind, Lifecycle, ResolvedBy};
use supplyline_logic::effects::EarlyResolution;
use supplyline_logic::ids::LocationId;
use supplyline_logic::network::{LocationKind, Network, RouteSpec};
use supplyline_logic::orders::{LineItem, OrderStatus};

// ── Helpers ────────────────────────────────────────────────────────────

struct Map {
    network: Network,
    farm: LocationId,
    hub: LocationId,
    market: LocationId,
}

/// Farm -> Hub -> Market over vulnerable roads, plus a slow rail lane.
fn map() -> Map {
    let mut network = Network::new();
    let farm = network.add_location("Farm", LocationKind::Vendor, 900);
    let hub = network.add_location("Hub", LocationKind::Hub, 1000);
    let market = network.add_location("Market", LocationKind::Store, 150);
    network
        .add_route(RouteSpec::new(farm, hub, "truck", 6.0).weather_vulnerable())
        .unwrap();
    network
        .add_route(RouteSpec::new(hub, market, "truck", 4.0).weather_vulnerable())
        .unwrap();
    network
        .add_route(RouteSpec::new(farm, market, "rail", 30.0).with_transit_days(4))
        .unwrap();
    Map {
        network,
        farm,
        hub,
        market,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn blizzard_blocks_every_player_and_reopens() {
    let m = map();
    let engine = GameEngine::with_seed(GameConfig::default(), m.network, 3);
    let ada = engine.register_player("Ada");
    let bram = engine.register_player("Bram");
    engine.set_day(2);

    let spike = engine.generate(ada, Some(DisruptionKind::Blizzard)).unwrap();
    engine.start_due(2).unwrap();

    let bram_plan = engine.best_path(m.farm, m.market, bram).unwrap().unwrap();
    assert_eq!(bram_plan.hops(), 1, "Bram is rerouted by Ada's blizzard");
    assert!(!engine.is_premium_route(&bram_plan).unwrap());

    engine.expire_due(spike.ends_at_day).unwrap();
    let bram_plan = engine.best_path(m.farm, m.market, bram).unwrap().unwrap();
    assert_eq!(bram_plan.hops(), 2);
    assert_eq!(bram_plan.effective_cost, 10.0);
}

#[test]
fn delay_moves_orders_and_early_resolution_restores_them() {
    let m = map();
    let engine = GameEngine::with_seed(GameConfig::default(), m.network, 11);
    let ada = engine.register_player("Ada");
    let grain = engine.add_product("Grain");
    let order = engine.place_order(
        ada,
        OrderStatus::InTransit,
        Some(6),
        None,
        vec![LineItem { product: grain, quantity: 30 }],
    );
    engine.set_day(4);
    let spike = engine.generate(ada, Some(DisruptionKind::Delay)).unwrap();
    engine.start_due(4).unwrap();

    let days = spike.delay_days();
    let moved = engine
        .world()
        .orders
        .iter()
        .find(|o| o.id == order)
        .and_then(|o| o.delivery_day);
    assert_eq!(moved, Some(6 + days));

    engine.deposit(ada, spike.resolution_cost);
    engine.resolve_early(spike.id).unwrap();
    let restored = engine
        .world()
        .orders
        .iter()
        .find(|o| o.id == order)
        .and_then(|o| o.delivery_day);
    assert_eq!(restored, Some(6));
    assert_eq!(
        engine.disruption(spike.id).unwrap().state,
        Lifecycle::Resolved(ResolvedBy::Player)
    );
    assert_eq!(engine.balance(ada), 0);
}

#[test]
fn overlapping_delays_paid_off_in_start_order_restore_delivery() {
    let m = map();
    let engine = GameEngine::with_seed(GameConfig::default(), m.network, 17);
    let ada = engine.register_player("Ada");
    let grain = engine.add_product("Grain");
    let order = engine.place_order(
        ada,
        OrderStatus::Pending,
        Some(20),
        None,
        vec![LineItem { product: grain, quantity: 10 }],
    );
    let delivery = || {
        engine
            .world()
            .orders
            .iter()
            .find(|o| o.id == order)
            .and_then(|o| o.delivery_day)
    };

    engine.set_day(4);
    let first = engine.generate(ada, Some(DisruptionKind::Delay)).unwrap();
    engine.start_due(4).unwrap();
    engine.set_day(5);
    let second = engine.generate(ada, Some(DisruptionKind::Delay)).unwrap();
    engine.start_due(5).unwrap();
    assert!(engine.disruption(second.id).unwrap().is_active());
    assert_eq!(delivery(), Some(20 + first.delay_days()));

    engine.deposit(ada, first.resolution_cost + second.resolution_cost);
    for id in [first.id, second.id] {
        assert!(matches!(
            engine.resolve_early(id).unwrap(),
            EarlyResolution::Resolved { .. }
        ));
    }
    assert_eq!(delivery(), Some(20));
}

#[test]
fn readers_route_while_writer_advances_days() {
    let m = map();
    let (farm, hub, market) = (m.farm, m.hub, m.market);
    let engine = Arc::new(GameEngine::with_seed(GameConfig::default(), m.network, 99));
    let ada = engine.register_player("Ada");
    let bram = engine.register_player("Bram");
    engine.add_product("Grain");

    let readers: Vec<_> = [ada, bram]
        .into_iter()
        .map(|player| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(engine.reachable(hub).is_ok());
                    if let Some(plan) = engine.best_path(farm, market, player).unwrap() {
                        assert!(plan.effective_cost >= plan.base_cost);
                    }
                }
            })
        })
        .collect();

    for _ in 0..20 {
        engine.advance_day().unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn save_and_load_preserve_world_and_cash() {
    let m = map();
    let engine = GameEngine::with_seed(GameConfig::default(), m.network, 5);
    let ada = engine.register_player("Ada");
    engine.add_product("Grain");
    engine.deposit(ada, 750);
    for _ in 0..6 {
        engine.advance_day().unwrap();
    }

    let mut buf = Vec::new();
    engine.save(&mut buf).unwrap();
    let loaded = GameEngine::load(buf.as_slice()).unwrap();

    assert_eq!(loaded.day(), engine.day());
    assert_eq!(loaded.balance(ada), 750);
    assert_eq!(loaded.seed(), 5);
    assert_eq!(loaded.disruptions_for(ada), engine.disruptions_for(ada));
    assert_eq!(
        loaded.world().network.routes(),
        engine.world().network.routes()
    );
    assert_eq!(
        loaded.best_path(m.farm, m.market, ada).unwrap(),
        engine.best_path(m.farm, m.market, ada).unwrap()
    );
}

#[test]
fn load_rejects_garbage() {
    let err = GameEngine::load(&[1u8, 2, 3][..]).err().unwrap();
    assert!(matches!(err, SaveError::Bincode(_)));
}
