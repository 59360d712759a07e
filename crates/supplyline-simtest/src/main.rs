//! Supplyline Headless Day-by-Day Harness
//!
//! Drives the disruption rules and the engine through a whole season without
//! any UI. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p supplyline-simtest
//!   cargo run -p supplyline-simtest -- --verbose
//!
//! `RUST_LOG` overrides the log filter (default `warn`, `info` with
//! `--verbose`).

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Deserialize;

use supplyline_core::prelude::*;
use supplyline_logic::config::GameConfig;
use supplyline_logic::constraints::{record_spike_started, ConstraintChecker, CooldownMap};
use supplyline_logic::disruption::{
    DisruptionEffect, DisruptionKind, DisruptionLedger, Lifecycle, NewDisruption, ResolvedBy,
};
use supplyline_logic::effects::{EarlyResolution, EffectEngine};
use supplyline_logic::ids::{LocationId, PlayerId, ProductId};
use supplyline_logic::network::{LocationKind, Network, RouteSpec};
use supplyline_logic::orders::{LineItem, OrderLedger, OrderStatus};
use supplyline_logic::routing::{self, Router};

// ── Scenario (same JSON a game server would load) ──────────────────────
const WORLD_JSON: &str = include_str!("../../../data/world.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    seed: u64,
    days: u32,
    starting_cash: u64,
    start_date: NaiveDate,
    players: Vec<String>,
    products: Vec<String>,
    locations: Vec<LocationSpec>,
    routes: Vec<RouteEntry>,
    #[serde(default)]
    config: GameConfig,
}

#[derive(Debug, Deserialize)]
struct LocationSpec {
    name: String,
    kind: LocationKind,
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    from: String,
    to: String,
    mode: String,
    cost: f64,
    transit_days: u32,
    capacity: u32,
    #[serde(default)]
    weather_vulnerable: bool,
}

impl Scenario {
    fn build_network(&self) -> Result<Network, String> {
        let mut net = Network::new();
        let mut by_name = HashMap::new();
        for loc in &self.locations {
            by_name.insert(loc.name.as_str(), net.add_location(&loc.name, loc.kind, loc.capacity));
        }
        for r in &self.routes {
            let lookup = |name: &str| {
                by_name
                    .get(name)
                    .copied()
                    .ok_or_else(|| format!("route references unknown location '{name}'"))
            };
            let mut spec = RouteSpec::new(lookup(&r.from)?, lookup(&r.to)?, &r.mode, r.cost)
                .with_transit_days(r.transit_days)
                .with_capacity(r.capacity);
            if r.weather_vulnerable {
                spec = spec.weather_vulnerable();
            }
            net.add_route(spec).map_err(|e| e.to_string())?;
        }
        Ok(net)
    }
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn check(name: &str, passed: bool, detail: impl Into<String>) -> TestResult {
    TestResult {
        name: name.into(),
        passed,
        detail: detail.into(),
    }
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if verbose { "info" } else { "warn" }),
    )
    .init();
    println!("=== Supplyline Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario file
    let scenario = match serde_json::from_str::<Scenario>(WORLD_JSON) {
        Ok(s) => Some(s),
        Err(e) => {
            results.push(check("scenario_parse", false, format!("JSON parse error: {e}")));
            None
        }
    };
    if let Some(scenario) = &scenario {
        results.extend(validate_scenario(scenario, verbose));
    }

    // 2. Routing on a synthetic triangle
    results.extend(validate_routing(verbose));

    // 3. Scheduling constraints
    results.extend(validate_constraints(verbose));

    // 4. Apply / rollback round trips
    if let Some(scenario) = &scenario {
        results.extend(validate_round_trips(scenario, verbose));
    }

    // 5. Full season through the engine
    if let Some(scenario) = &scenario {
        results.extend(run_season(scenario, verbose));
    }

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Scenario ─────────────────────────────────────────────────────────

fn validate_scenario(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    println!("--- Scenario: {} ---", scenario.name);
    let mut results = Vec::new();

    results.push(match scenario.config.validate() {
        Ok(()) => check("config_valid", true, "tuning ranges are ordered"),
        Err(e) => check("config_valid", false, e.to_string()),
    });

    let net = match scenario.build_network() {
        Ok(net) => net,
        Err(e) => {
            results.push(check("network_build", false, e));
            return results;
        }
    };
    results.push(check(
        "network_build",
        net.location_count() == scenario.locations.len() && net.route_count() == scenario.routes.len(),
        format!("{} locations, {} routes", net.location_count(), net.route_count()),
    ));

    let stranded: Vec<&str> = net
        .locations()
        .iter()
        .filter(|l| !routing::reachable(&net, l.id).unwrap_or(false))
        .map(|l| l.name.as_str())
        .collect();
    results.push(check(
        "every_location_supplied",
        stranded.is_empty(),
        if stranded.is_empty() {
            "every location is reachable from a supply source".to_string()
        } else {
            format!("stranded: {}", stranded.join(", "))
        },
    ));

    let vulnerable = net.routes().iter().filter(|r| r.weather_vulnerable).count();
    results.push(check(
        "blizzard_targets_exist",
        vulnerable > 0,
        format!("{vulnerable} weather-vulnerable routes"),
    ));

    if verbose {
        for loc in net.locations() {
            println!("    {:18} {:10?} capacity {}", loc.name, loc.kind, loc.capacity);
        }
    }

    results
}

// ── 2. Routing ──────────────────────────────────────────────────────────

fn validate_routing(_verbose: bool) -> Vec<TestResult> {
    println!("--- Routing ---");
    let mut results = Vec::new();

    let mut net = Network::new();
    let a = net.add_location("A", LocationKind::Vendor, 100);
    let b = net.add_location("B", LocationKind::Store, 100);
    let c = net.add_location("C", LocationKind::Hub, 100);
    let (Ok(ab), Ok(ac), Ok(cb)) = (
        net.add_route(RouteSpec::new(a, b, "truck", 10.0)),
        net.add_route(RouteSpec::new(a, c, "truck", 40.0)),
        net.add_route(RouteSpec::new(c, b, "truck", 40.0)),
    ) else {
        results.push(check("routing_fixture", false, "could not build triangle"));
        return results;
    };

    let alice = PlayerId(1);
    let bob = PlayerId(2);
    let mut ledger = DisruptionLedger::new();
    let mut router = Router::new();

    let cost = |router: &mut Router, ledger: &DisruptionLedger, who| {
        router
            .best_path(&net, ledger, a, b, who)
            .ok()
            .flatten()
            .map(|p| (p.routes, p.effective_cost))
    };

    results.push(check(
        "route_base",
        cost(&mut router, &ledger, alice) == Some((vec![ab], 10.0)),
        "A→B direct at 10",
    ));

    activate(&mut ledger, alice, DisruptionEffect::price(None, Some(ab)), 2.0);
    results.push(check(
        "route_surcharge",
        cost(&mut router, &ledger, alice) == Some((vec![ab], 30.0)),
        "one spike of 2.0 → 10 × 3 = 30",
    ));

    activate(&mut ledger, alice, DisruptionEffect::delay(None, Some(ab)), 6.0);
    results.push(check(
        "route_detour",
        cost(&mut router, &ledger, alice) == Some((vec![ac, cb], 80.0)),
        "magnitudes add to 8.0 → direct 90, detour via C at 80",
    ));

    results.push(check(
        "route_player_isolation",
        cost(&mut router, &ledger, bob) == Some((vec![ab], 10.0)),
        "Bob still pays base cost after Alice's snapshot",
    ));

    let same = router.best_path(&net, &ledger, a, a, alice).ok().flatten();
    results.push(check(
        "route_same_node",
        same.is_some_and(|p| p.is_empty()),
        "A→A = empty plan",
    ));

    let unknown = router.best_path(&net, &ledger, a, LocationId(42), alice);
    results.push(check(
        "route_unknown_location",
        unknown.is_err(),
        "unknown target is a structural error",
    ));

    results
}

fn activate(ledger: &mut DisruptionLedger, owner: PlayerId, effect: DisruptionEffect, magnitude: f64) {
    let id = ledger.schedule(NewDisruption::new(owner, effect, magnitude, 1, 10));
    if let Ok(spike) = ledger.get_mut(id) {
        spike.state = Lifecycle::Active;
    }
}

// ── 3. Constraints ──────────────────────────────────────────────────────

fn validate_constraints(_verbose: bool) -> Vec<TestResult> {
    println!("--- Constraints ---");
    let mut results = Vec::new();
    let player = PlayerId(1);

    let mut ledger = DisruptionLedger::new();
    ledger.schedule(NewDisruption::new(player, DisruptionEffect::demand(None), 0.3, 3, 6));
    ledger.schedule(NewDisruption::new(player, DisruptionEffect::price(None, None), 0.3, 4, 7));
    let checker = ConstraintChecker::new(&ledger);
    let counts: Vec<usize> = (3..=7).map(|d| checker.covering_count(player, d)).collect();
    results.push(check(
        "covering_half_open",
        counts == vec![1, 2, 2, 1, 0],
        format!("[3,6) + [4,7) on days 3..=7 → {counts:?}"),
    ));
    results.push(check(
        "cap_blocks_third",
        !checker.can_schedule(player, 4, 2) && checker.can_schedule(player, 6, 2),
        "cap 2 reached on day 4, free again on day 6",
    ));

    let mut cooldowns = CooldownMap::new();
    record_spike_started(&mut cooldowns, DisruptionKind::Blizzard, 10);
    let blocked = (8..=12).all(|d| {
        !checker
            .allowed_kinds(player, d, &cooldowns)
            .contains(&DisruptionKind::Blizzard)
    });
    let free = checker
        .allowed_kinds(player, 13, &cooldowns)
        .contains(&DisruptionKind::Blizzard);
    results.push(check(
        "cooldown_window",
        blocked && free,
        "blizzard blocked on days 8..=12, allowed on 13",
    ));

    for kind in DisruptionKind::all() {
        record_spike_started(&mut cooldowns, *kind, 20);
    }
    let fallback = checker.generatable_kinds(player, 20, &cooldowns);
    results.push(check(
        "empty_filter_fallback",
        fallback.len() == DisruptionKind::all().len(),
        "every kind cooling → full set",
    ));

    results
}

// ── 4. Round trips ──────────────────────────────────────────────────────

fn validate_round_trips(scenario: &Scenario, _verbose: bool) -> Vec<TestResult> {
    println!("--- Apply / Rollback ---");
    let mut results = Vec::new();
    let Ok(mut net) = scenario.build_network() else {
        return results;
    };
    let owner = PlayerId(1);
    let mut ledger = DisruptionLedger::new();
    let mut orders = OrderLedger::new();
    orders.place(
        owner,
        OrderStatus::InTransit,
        Some(5),
        scenario.start_date.checked_add_days(Days::new(4)),
        vec![LineItem { product: ProductId(0), quantity: 25 }],
    );
    orders.place(owner, OrderStatus::Delivered, Some(2), None, vec![]);

    let hub = net
        .locations()
        .iter()
        .find(|l| l.kind == LocationKind::Hub)
        .map(|l| l.id)
        .unwrap_or(LocationId(0));
    let exposed = net
        .routes()
        .iter()
        .find(|r| r.weather_vulnerable)
        .map(|r| r.id);

    let mut effects = vec![
        DisruptionEffect::demand(Some(ProductId(0))),
        DisruptionEffect::price(None, None),
        DisruptionEffect::delay(None, None),
        DisruptionEffect::breakdown(hub),
    ];
    effects.extend(exposed.map(DisruptionEffect::blizzard));

    let locations_before = net.locations().to_vec();
    let routes_before = net.routes().to_vec();
    let orders_before: Vec<_> = orders.iter().cloned().collect();

    for effect in effects {
        let kind = effect.kind();
        let magnitude = if kind == DisruptionKind::Delay { 2.0 } else { 0.5 };
        let id = ledger.schedule(NewDisruption::new(owner, effect, magnitude, 1, 3));
        let mut engine = EffectEngine::new(&mut net, &mut ledger, &mut orders);
        let outcome = engine.apply(id).and_then(|_| engine.expire(id));
        let restored = net.locations() == locations_before.as_slice()
            && net.routes() == routes_before.as_slice()
            && orders.iter().cloned().collect::<Vec<_>>() == orders_before;
        results.push(check(
            &format!("round_trip_{}", kind.label()),
            outcome.is_ok() && restored,
            match outcome {
                Ok(()) => format!("{} restored exactly", kind.label()),
                Err(e) => e.to_string(),
            },
        ));
    }

    // Breakdown 1000 → 500 → 1000 on a fresh depot.
    let mut net = Network::new();
    let depot = net.add_location("Depot", LocationKind::Warehouse, 1000);
    let mut ledger = DisruptionLedger::new();
    let mut orders = OrderLedger::new();
    let id = ledger.schedule(NewDisruption::new(owner, DisruptionEffect::breakdown(depot), 0.5, 1, 3));
    let mut capacities = Vec::new();
    let mut engine = EffectEngine::new(&mut net, &mut ledger, &mut orders);
    let applied = engine.apply(id).is_ok();
    let double_apply_refused = engine.apply(id).is_err();
    capacities.push(net.location(depot).map(|l| l.capacity).unwrap_or(0));
    let mut engine = EffectEngine::new(&mut net, &mut ledger, &mut orders);
    let rolled_back = engine.rollback(id, ResolvedBy::Time).is_ok();
    capacities.push(net.location(depot).map(|l| l.capacity).unwrap_or(0));
    results.push(check(
        "breakdown_capacity",
        applied && double_apply_refused && rolled_back && capacities == vec![500, 1000],
        format!("1000 → {:?}", capacities),
    ));

    results
}

// ── 5. Season ───────────────────────────────────────────────────────────

fn run_season(scenario: &Scenario, verbose: bool) -> Vec<TestResult> {
    println!("--- Season ({} days) ---", scenario.days);
    let mut results = Vec::new();
    let Ok(net) = scenario.build_network() else {
        return results;
    };
    let original_capacities: Vec<u32> = net.locations().iter().map(|l| l.capacity).collect();
    let engine = GameEngine::with_seed(scenario.config.clone(), net, scenario.seed);
    let products: Vec<ProductId> = scenario.products.iter().map(|p| engine.add_product(p)).collect();
    let players: Vec<PlayerId> = scenario
        .players
        .iter()
        .map(|name| engine.register_player(name))
        .collect();

    for (i, &player) in players.iter().enumerate() {
        engine.deposit(player, scenario.starting_cash);
        for week in 0..6u32 {
            let day = 2 + week * 7 + i as u32;
            engine.place_order(
                player,
                OrderStatus::Pending,
                Some(day),
                scenario.start_date.checked_add_days(Days::new(u64::from(day))),
                vec![LineItem {
                    product: products[(week as usize + i) % products.len().max(1)],
                    quantity: 20 + week * 5,
                }],
            );
        }
    }

    let mut violations = Vec::new();
    let mut kinds_seen: HashMap<DisruptionKind, usize> = HashMap::new();
    let mut early = 0usize;
    let mut saved = Vec::new();

    for _ in 1..scenario.days {
        let report = match engine.advance_day() {
            Ok(r) => r,
            Err(e) => {
                violations.push(format!("advance failed: {e}"));
                break;
            }
        };
        let day = report.day;

        for id in &report.started {
            if let Ok(spike) = engine.disruption(*id) {
                *kinds_seen.entry(spike.kind()).or_default() += 1;
            }
        }

        for &player in &players {
            let covering = engine.covering_count(player, day);
            if covering > engine.config().guaranteed_cap.max(engine.config().opportunistic_cap) {
                violations.push(format!("day {day}: {player} covered by {covering} spikes"));
            }
        }

        {
            let world = engine.world();
            for route in world.network.routes() {
                let blizzard = world
                    .disruptions
                    .active_on_route(route.id)
                    .any(|d| d.kind() == DisruptionKind::Blizzard);
                if blizzard == route.is_active {
                    violations.push(format!(
                        "day {day}: {} active={} with blizzard={blizzard}",
                        route.id, route.is_active
                    ));
                }
            }
        }

        // Every third day the first player pays off their priciest spike.
        if day % 3 == 0 {
            let target = engine
                .disruptions_for(players[0])
                .into_iter()
                .filter(|d| d.is_active())
                .max_by_key(|d| d.resolution_cost);
            if let Some(spike) = target {
                match engine.resolve_early(spike.id) {
                    Ok(EarlyResolution::Resolved { cost }) => {
                        log::info!("{} paid {cost} to end {}", players[0], spike.id);
                        early += 1;
                    }
                    Ok(EarlyResolution::Declined(reason)) => {
                        log::info!("Could not end {}: {reason}", spike.id);
                    }
                    Err(e) => violations.push(format!("day {day}: resolve failed: {e}")),
                }
            }
        }

        if day == scenario.days / 2 && engine.save(&mut saved).is_err() {
            violations.push(format!("day {day}: save failed"));
        }

        if verbose {
            println!(
                "    day {:>2}: +{} scheduled, {} started, {} expired",
                day,
                report.scheduled.len(),
                report.started.len(),
                report.expired.len()
            );
        }
    }

    results.push(check(
        "season_invariants",
        violations.is_empty(),
        if violations.is_empty() {
            format!("{} days without a violation", scenario.days)
        } else {
            violations.join("; ")
        },
    ));

    let first_day_spike = players.iter().any(|&p| {
        engine
            .disruptions_for(p)
            .iter()
            .any(|d| d.is_guaranteed && d.starts_at_day <= engine.config().tutorial_grace_day)
    });
    results.push(check(
        "season_grace_day",
        !first_day_spike,
        "no guaranteed spike during the grace period",
    ));

    results.push(check(
        "season_variety",
        kinds_seen.len() >= 3,
        format!("{} kinds started, {early} resolved early", kinds_seen.len()),
    ));

    // Run out the clock and make sure everything heals.
    let end = engine.day() + 10;
    let drained = engine.expire_due(end).is_ok();
    let healed = {
        let world = engine.world();
        let capacities: Vec<u32> = world.network.locations().iter().map(|l| l.capacity).collect();
        capacities == original_capacities && world.network.routes().iter().all(|r| r.is_active)
    };
    results.push(check(
        "season_heals",
        drained && healed,
        "all capacities and routes back to baseline once spikes end",
    ));

    let reloaded = match GameEngine::load(saved.as_slice()) {
        Ok(loaded) => loaded.day() == scenario.days / 2 && loaded.world().players.len() == players.len(),
        Err(e) => {
            log::warn!("Reload failed: {e}");
            false
        }
    };
    results.push(check(
        "season_save_load",
        reloaded,
        format!("mid-season save ({} bytes) reloads", saved.len()),
    ));

    results
}
