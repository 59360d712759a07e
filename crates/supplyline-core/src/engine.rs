//! Game engine - the shared world plus the hooks a day driver calls.
//!
//! The world sits behind one `RwLock`. Routing and other reads share the
//! read lock; every spike transition takes the write lock for its whole
//! duration, so nobody ever routes over a half-applied effect. The router
//! cache has its own mutex and is always locked after the world.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use supplyline_logic::config::GameConfig;
use supplyline_logic::constraints::{record_spike_started, ConstraintChecker, CooldownMap};
use supplyline_logic::disruption::{Disruption, DisruptionKind, DisruptionLedger, ResolvedBy};
use supplyline_logic::effects::{EarlyResolution, EffectEngine};
use supplyline_logic::generator::{DisruptionGenerator, GenerationContext};
use supplyline_logic::ids::{Day, DisruptionId, LocationId, OrderId, PlayerId, ProductId};
use supplyline_logic::market;
use supplyline_logic::network::Network;
use supplyline_logic::orders::{LineItem, OrderLedger, OrderStatus};
use supplyline_logic::routing::{self, RoutePlan, Router};
use supplyline_logic::Result;

use crate::persistence::{self, SaveData, SaveError, SAVE_VERSION};
use crate::treasury::Treasury;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub name: String,
    pub cooldowns: CooldownMap,
}

/// Everything spikes can read or change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    pub day: Day,
    pub network: Network,
    pub disruptions: DisruptionLedger,
    pub orders: OrderLedger,
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub products: BTreeMap<ProductId, String>,
}

impl World {
    fn effects(&mut self) -> EffectEngine<'_> {
        EffectEngine::new(&mut self.network, &mut self.disruptions, &mut self.orders)
    }
}

/// What one `advance_day` did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayReport {
    pub day: Day,
    pub expired: Vec<DisruptionId>,
    pub scheduled: Vec<DisruptionId>,
    pub started: Vec<DisruptionId>,
}

pub struct GameEngine {
    world: RwLock<World>,
    router: Mutex<Router>,
    rng: Mutex<StdRng>,
    treasury: Mutex<Treasury>,
    config: GameConfig,
    seed: u64,
}

impl GameEngine {
    /// Create an engine with a random seed.
    pub fn new(config: GameConfig, network: Network) -> Self {
        Self::with_seed(config, network, rand::random())
    }

    /// Create an engine whose generation is reproducible.
    pub fn with_seed(config: GameConfig, network: Network, seed: u64) -> Self {
        log::info!(
            "Engine ready: {} locations, {} routes, seed {seed}",
            network.location_count(),
            network.route_count()
        );
        Self {
            world: RwLock::new(World {
                day: 1,
                network,
                ..World::default()
            }),
            router: Mutex::new(Router::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            treasury: Mutex::new(Treasury::new()),
            config,
            seed,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Read access to the whole world. Hold it briefly; writers wait on it.
    pub fn world(&self) -> RwLockReadGuard<'_, World> {
        self.world.read()
    }

    // ── Setup ──────────────────────────────────────────────────────────

    pub fn register_player(&self, name: &str) -> PlayerId {
        let mut world = self.world.write();
        let id = PlayerId(world.players.len() as u64 + 1);
        world.players.insert(
            id,
            PlayerState {
                id,
                name: name.to_string(),
                cooldowns: CooldownMap::new(),
            },
        );
        log::info!("Registered {id} ({name})");
        id
    }

    pub fn add_product(&self, name: &str) -> ProductId {
        let mut world = self.world.write();
        let id = ProductId(world.products.len() as u32);
        world.products.insert(id, name.to_string());
        id
    }

    pub fn place_order(
        &self,
        owner: PlayerId,
        status: OrderStatus,
        delivery_day: Option<Day>,
        delivery_date: Option<NaiveDate>,
        items: Vec<LineItem>,
    ) -> OrderId {
        self.world
            .write()
            .orders
            .place(owner, status, delivery_day, delivery_date, items)
    }

    pub fn deposit(&self, player: PlayerId, amount: u64) -> u64 {
        self.treasury.lock().deposit(player, amount)
    }

    pub fn balance(&self, player: PlayerId) -> u64 {
        self.treasury.lock().balance(player)
    }

    // ── Day hooks ──────────────────────────────────────────────────────

    pub fn day(&self) -> Day {
        self.world.read().day
    }

    pub fn set_day(&self, day: Day) {
        self.world.write().day = day;
    }

    /// Daily guaranteed spike for `player` on the current day.
    pub fn generate_guaranteed(&self, player: PlayerId) -> Option<Disruption> {
        let mut guard = self.world.write();
        let world = &mut *guard;
        let empty = CooldownMap::new();
        let cooldowns = world.players.get(&player).map_or(&empty, |p| &p.cooldowns);
        let products: Vec<ProductId> = world.products.keys().copied().collect();
        let ctx = GenerationContext {
            network: &world.network,
            cooldowns,
            products: &products,
        };
        let mut rng = self.rng.lock();
        DisruptionGenerator::new(&self.config).generate_guaranteed(
            &mut world.disruptions,
            &ctx,
            player,
            world.day,
            &mut *rng,
        )
    }

    /// Opportunistic spike for `player` on the current day.
    pub fn generate(&self, player: PlayerId, force_kind: Option<DisruptionKind>) -> Option<Disruption> {
        let mut guard = self.world.write();
        let world = &mut *guard;
        let empty = CooldownMap::new();
        let cooldowns = world.players.get(&player).map_or(&empty, |p| &p.cooldowns);
        let products: Vec<ProductId> = world.products.keys().copied().collect();
        let ctx = GenerationContext {
            network: &world.network,
            cooldowns,
            products: &products,
        };
        let mut rng = self.rng.lock();
        DisruptionGenerator::new(&self.config).generate(
            &mut world.disruptions,
            &ctx,
            player,
            world.day,
            force_kind,
            &mut *rng,
        )
    }

    /// Apply every scheduled spike whose start day has arrived and record
    /// the cooldown for its kind.
    pub fn start_due(&self, day: Day) -> Result<Vec<DisruptionId>> {
        let mut guard = self.world.write();
        let world = &mut *guard;
        let due = world.disruptions.due_to_start(day);
        for id in &due {
            let spike = world.disruptions.get(*id)?;
            let (owner, kind) = (spike.owner, spike.kind());
            world.effects().apply(*id)?;
            if let Some(player) = world.players.get_mut(&owner) {
                record_spike_started(&mut player.cooldowns, kind, day);
            }
        }
        Ok(due)
    }

    /// Roll back every active spike whose interval has closed.
    pub fn expire_due(&self, day: Day) -> Result<Vec<DisruptionId>> {
        let mut world = self.world.write();
        let due = world.disruptions.due_to_expire(day);
        for id in &due {
            world.effects().expire(*id)?;
        }
        Ok(due)
    }

    /// Move to the next day: expire, generate for every player, start.
    pub fn advance_day(&self) -> Result<DayReport> {
        let day = {
            let mut world = self.world.write();
            world.day += 1;
            world.day
        };
        let expired = self.expire_due(day)?;
        let players: Vec<PlayerId> = self.world.read().players.keys().copied().collect();
        let mut scheduled = Vec::new();
        for player in players {
            scheduled.extend(self.generate_guaranteed(player).map(|d| d.id));
            scheduled.extend(self.generate(player, None).map(|d| d.id));
        }
        let started = self.start_due(day)?;
        Ok(DayReport {
            day,
            expired,
            scheduled,
            started,
        })
    }

    // ── Transitions ────────────────────────────────────────────────────

    pub fn apply(&self, id: DisruptionId) -> Result<()> {
        self.world.write().effects().apply(id)
    }

    pub fn rollback(&self, id: DisruptionId, by: ResolvedBy) -> Result<()> {
        self.world.write().effects().rollback(id, by)
    }

    /// Pay to end an active spike now.
    pub fn resolve_early(&self, id: DisruptionId) -> Result<EarlyResolution> {
        let mut world = self.world.write();
        let mut treasury = self.treasury.lock();
        world.effects().resolve_early(id, &mut *treasury)
    }

    pub fn disruption(&self, id: DisruptionId) -> Result<Disruption> {
        self.world.read().disruptions.get(id).cloned()
    }

    pub fn disruptions_for(&self, player: PlayerId) -> Vec<Disruption> {
        self.world.read().disruptions.owned_by(player).cloned().collect()
    }

    pub fn covering_count(&self, player: PlayerId, day: Day) -> usize {
        let world = self.world.read();
        ConstraintChecker::new(&world.disruptions).covering_count(player, day)
    }

    // ── Routing ────────────────────────────────────────────────────────

    pub fn reachable(&self, target: LocationId) -> Result<bool> {
        routing::reachable(&self.world.read().network, target)
    }

    pub fn best_path(
        &self,
        source: LocationId,
        target: LocationId,
        player: PlayerId,
    ) -> Result<Option<RoutePlan>> {
        let world = self.world.read();
        let mut router = self.router.lock();
        router.best_path(&world.network, &world.disruptions, source, target, player)
    }

    pub fn is_premium_route(&self, plan: &RoutePlan) -> Result<bool> {
        routing::is_premium_route(&self.world.read().network, plan)
    }

    // ── Economy read-side ──────────────────────────────────────────────

    pub fn demand_multiplier(&self, player: PlayerId, product: ProductId) -> f64 {
        let world = self.world.read();
        market::demand_multiplier(&world.disruptions, player, product, world.day)
    }

    pub fn price_multiplier(&self, player: PlayerId, product: ProductId) -> f64 {
        let world = self.world.read();
        market::price_multiplier(&world.disruptions, player, product, world.day)
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Save game state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> std::result::Result<(), SaveError> {
        let data = SaveData {
            version: SAVE_VERSION,
            seed: self.seed,
            config: self.config.clone(),
            world: self.world.read().clone(),
            treasury: self.treasury.lock().clone(),
        };
        persistence::save_game(writer, &data)
    }

    /// Load game state from a reader
    pub fn load<R: std::io::Read>(reader: R) -> std::result::Result<Self, SaveError> {
        let data = persistence::load_game(reader)?;
        let rng = StdRng::seed_from_u64(data.seed ^ u64::from(data.world.day));
        log::info!("Loaded save at day {}", data.world.day);
        Ok(Self {
            world: RwLock::new(data.world),
            router: Mutex::new(Router::new()),
            rng: Mutex::new(rng),
            treasury: Mutex::new(data.treasury),
            config: data.config,
            seed: data.seed,
        })
    }
}
