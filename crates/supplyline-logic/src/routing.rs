//! Reachability and cost-aware routing over the network.
//!
//! `reachable` ignores costs and players entirely. `best_path` runs Dijkstra
//! over active routes using the player's effective costs:
//!
//! ```text
//! effective_cost(route, player) = base_cost × (1 + Σ magnitude)
//! ```
//!
//! where the sum runs over every Active spike the player owns that targets
//! the route. Magnitudes add; they never compound.
//!
//! The [`Router`] caches one adjacency snapshot per player with the effective
//! costs baked in. A snapshot remembers the network and ledger revisions it
//! was built from and is rebuilt as soon as either moves on.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::disruption::DisruptionLedger;
use crate::error::Result;
use crate::ids::{LocationId, PlayerId, RouteId};
use crate::network::Network;

/// An ordered chain of routes from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub source: LocationId,
    pub target: LocationId,
    pub routes: Vec<RouteId>,
    /// Sum of per-player effective costs.
    pub effective_cost: f64,
    /// Sum of base costs along the same chain.
    pub base_cost: f64,
    pub transit_days: u32,
}

impl RoutePlan {
    fn empty(at: LocationId) -> Self {
        Self {
            source: at,
            target: at,
            routes: Vec::new(),
            effective_cost: 0.0,
            base_cost: 0.0,
            transit_days: 0,
        }
    }

    fn from_edges(source: LocationId, target: LocationId, edges: &[Edge]) -> Self {
        Self {
            source,
            target,
            routes: edges.iter().map(|e| e.route).collect(),
            effective_cost: edges.iter().map(|e| e.effective_cost).sum(),
            base_cost: edges.iter().map(|e| e.base_cost).sum(),
            transit_days: edges.iter().map(|e| e.transit_days).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn hops(&self) -> usize {
        self.routes.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    route: RouteId,
    source: LocationId,
    target: LocationId,
    base_cost: f64,
    effective_cost: f64,
    transit_days: u32,
}

/// Total order over non-NaN costs for the heap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cost(f64);

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Active adjacency with costs for one player, indexed by location.
#[derive(Debug, Clone)]
struct Snapshot {
    adjacency: Vec<Vec<Edge>>,
    network_revision: u64,
    ledger_revision: u64,
}

impl Snapshot {
    fn build(network: &Network, surcharges: &HashMap<RouteId, f64>, ledger_revision: u64) -> Self {
        let mut adjacency = vec![Vec::new(); network.location_count()];
        for route in network.active_routes() {
            let surcharge = surcharges.get(&route.id).copied().unwrap_or(0.0);
            adjacency[route.source.0 as usize].push(Edge {
                route: route.id,
                source: route.source,
                target: route.target,
                base_cost: route.base_cost,
                effective_cost: route.base_cost * (1.0 + surcharge),
                transit_days: route.transit_days,
            });
        }
        Self {
            adjacency,
            network_revision: network.revision(),
            ledger_revision,
        }
    }

    fn is_current(&self, network: &Network, ledger: &DisruptionLedger) -> bool {
        self.network_revision == network.revision() && self.ledger_revision == ledger.revision()
    }

    /// Dijkstra. A distance is only replaced by a strictly smaller one and
    /// equal-cost heap entries pop in push order, so ties go to whichever
    /// chain was discovered first.
    fn shortest(&self, source: LocationId, target: LocationId) -> Option<Vec<Edge>> {
        let (source, target) = (source.0 as usize, target.0 as usize);
        let mut dist = vec![f64::INFINITY; self.adjacency.len()];
        let mut via: Vec<Option<Edge>> = vec![None; self.adjacency.len()];
        let mut heap = BinaryHeap::new();
        let mut seq: u64 = 0;

        dist[source] = 0.0;
        heap.push(Reverse((Cost(0.0), seq, source)));

        while let Some(Reverse((Cost(cost), _, node))) = heap.pop() {
            if node == target {
                break;
            }
            if cost > dist[node] {
                continue;
            }
            for edge in &self.adjacency[node] {
                let next = edge.target.0 as usize;
                let candidate = cost + edge.effective_cost;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    via[next] = Some(*edge);
                    seq += 1;
                    heap.push(Reverse((Cost(candidate), seq, next)));
                }
            }
        }

        let mut path = Vec::new();
        let mut node = target;
        while node != source {
            let edge = via[node]?;
            path.push(edge);
            node = edge.source.0 as usize;
        }
        path.reverse();
        Some(path)
    }
}

/// `route -> Σ magnitude` over the player's active spikes.
fn surcharges(ledger: &DisruptionLedger, player: PlayerId) -> HashMap<RouteId, f64> {
    let mut by_route = HashMap::new();
    for spike in ledger.active_for(player) {
        if let Some(route) = spike.effect.target_route() {
            *by_route.entry(route).or_insert(0.0) += spike.magnitude;
        }
    }
    by_route
}

/// Cost of one route for one player right now.
pub fn effective_cost(
    network: &Network,
    ledger: &DisruptionLedger,
    route: RouteId,
    player: PlayerId,
) -> Result<f64> {
    let base = network.route(route)?.base_cost;
    let surcharge = surcharges(ledger, player)
        .get(&route)
        .copied()
        .unwrap_or(0.0);
    Ok(base * (1.0 + surcharge))
}

/// Can any supply source still reach `target` over active routes?
///
/// Walks incoming routes backwards from `target`. A supply source is
/// trivially reachable.
pub fn reachable(network: &Network, target: LocationId) -> Result<bool> {
    if network.location(target)?.kind.is_supply_source() {
        return Ok(true);
    }

    let mut incoming: Vec<Vec<LocationId>> = vec![Vec::new(); network.location_count()];
    for route in network.active_routes() {
        incoming[route.target.0 as usize].push(route.source);
    }

    let mut visited = vec![false; network.location_count()];
    let mut queue = VecDeque::new();
    visited[target.0 as usize] = true;
    queue.push_back(target);

    while let Some(node) = queue.pop_front() {
        for &prev in &incoming[node.0 as usize] {
            if visited[prev.0 as usize] {
                continue;
            }
            if network.location(prev)?.kind.is_supply_source() {
                return Ok(true);
            }
            visited[prev.0 as usize] = true;
            queue.push_back(prev);
        }
    }
    Ok(false)
}

/// Cheapest chain by base cost alone, ignoring every player's spikes.
pub fn cheapest_base_path(
    network: &Network,
    source: LocationId,
    target: LocationId,
) -> Result<Option<RoutePlan>> {
    network.location(source)?;
    network.location(target)?;
    if source == target {
        return Ok(Some(RoutePlan::empty(source)));
    }
    let snapshot = Snapshot::build(network, &HashMap::new(), 0);
    Ok(snapshot
        .shortest(source, target)
        .map(|edges| RoutePlan::from_edges(source, target, &edges)))
}

/// True when spikes pushed the plan off the base-cost optimum.
pub fn is_premium_route(network: &Network, plan: &RoutePlan) -> Result<bool> {
    let base = cheapest_base_path(network, plan.source, plan.target)?;
    Ok(match base {
        Some(base) => base.routes != plan.routes,
        None => !plan.is_empty(),
    })
}

/// Per-player snapshot cache in front of Dijkstra.
#[derive(Debug, Default)]
pub struct Router {
    snapshots: HashMap<PlayerId, Snapshot>,
    bound: Option<PlayerId>,
    builds: u64,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the player context. Binding someone else drops the snapshot of
    /// whoever was bound before.
    pub fn for_player(&mut self, player: PlayerId) -> &mut Self {
        if let Some(previous) = self.bound.filter(|p| *p != player) {
            if self.snapshots.remove(&previous).is_some() {
                log::debug!("Router: dropped snapshot of {previous}, now routing for {player}");
            }
        }
        self.bound = Some(player);
        self
    }

    pub fn bound_player(&self) -> Option<PlayerId> {
        self.bound
    }

    pub fn invalidate(&mut self, player: PlayerId) {
        self.snapshots.remove(&player);
    }

    pub fn invalidate_all(&mut self) {
        self.snapshots.clear();
    }

    pub fn is_cached(&self, player: PlayerId) -> bool {
        self.snapshots.contains_key(&player)
    }

    /// How many snapshots have been built so far.
    pub fn snapshot_builds(&self) -> u64 {
        self.builds
    }

    /// Cheapest active chain from `source` to `target` for `player`.
    ///
    /// Unknown endpoints are an error; no path is `Ok(None)`.
    pub fn best_path(
        &mut self,
        network: &Network,
        ledger: &DisruptionLedger,
        source: LocationId,
        target: LocationId,
        player: PlayerId,
    ) -> Result<Option<RoutePlan>> {
        network.location(source)?;
        network.location(target)?;
        self.for_player(player);
        if source == target {
            return Ok(Some(RoutePlan::empty(source)));
        }
        let snapshot = self.snapshot(network, ledger, player);
        Ok(snapshot
            .shortest(source, target)
            .map(|edges| RoutePlan::from_edges(source, target, &edges)))
    }

    fn snapshot(
        &mut self,
        network: &Network,
        ledger: &DisruptionLedger,
        player: PlayerId,
    ) -> &Snapshot {
        let build = || Snapshot::build(network, &surcharges(ledger, player), ledger.revision());
        let builds = &mut self.builds;
        let snapshot = self.snapshots.entry(player).or_insert_with(|| {
            *builds += 1;
            build()
        });
        if !snapshot.is_current(network, ledger) {
            log::debug!("Router: snapshot of {player} is stale, rebuilding");
            *builds += 1;
            *snapshot = build();
        }
        snapshot
    }
}
