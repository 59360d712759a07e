//! The transport graph: locations (nodes) and routes (directed edges).
//!
//! The graph is a directed multigraph — several routes may connect the same
//! pair of locations with different transport modes. Routes are created at
//! world setup and never deleted; only `is_active` flips.
//!
//! `Route::is_active` and `Location::capacity` are **world-scoped**: a
//! change is visible to every player at once. Per-player cost surcharges are
//! never stored here, they live in the disruption ledger and are folded in by
//! the router.

use serde::{Deserialize, Serialize};

use crate::error::{LogisticsError, Result};
use crate::ids::{LocationId, RouteId};

/// What a location does in the supply chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Vendor,
    Warehouse,
    Hub,
    Store,
}

impl LocationKind {
    /// Vendors and warehouses are roots for reachability.
    pub fn is_supply_source(self) -> bool {
        matches!(self, Self::Vendor | Self::Warehouse)
    }

    pub fn all() -> &'static [LocationKind] {
        &[Self::Vendor, Self::Warehouse, Self::Hub, Self::Store]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
    /// Baseline storage limit in units. Only breakdowns change it.
    pub capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub source: LocationId,
    pub target: LocationId,
    /// Free-form tag such as `truck`, `rail` or `air`.
    pub transport_mode: String,
    pub base_cost: f64,
    pub transit_days: u32,
    /// Units per shipment.
    pub capacity: u32,
    pub is_active: bool,
    /// Only consulted when picking blizzard targets.
    pub weather_vulnerable: bool,
}

/// Everything needed to create a route; the network assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub source: LocationId,
    pub target: LocationId,
    pub transport_mode: String,
    pub base_cost: f64,
    pub transit_days: u32,
    pub capacity: u32,
    #[serde(default)]
    pub weather_vulnerable: bool,
}

impl RouteSpec {
    pub fn new(source: LocationId, target: LocationId, mode: &str, base_cost: f64) -> Self {
        Self {
            source,
            target,
            transport_mode: mode.to_string(),
            base_cost,
            transit_days: 1,
            capacity: 100,
            weather_vulnerable: false,
        }
    }

    pub fn with_transit_days(mut self, days: u32) -> Self {
        self.transit_days = days;
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn weather_vulnerable(mut self) -> Self {
        self.weather_vulnerable = true;
        self
    }
}

/// Graph store. Locations and routes are kept in insertion order, which is
/// also the order the router explores them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    locations: Vec<Location>,
    routes: Vec<Route>,
    /// Bumped on every world-scoped mutation so cached views can tell they
    /// are stale.
    revision: u64,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&mut self, name: &str, kind: LocationKind, capacity: u32) -> LocationId {
        let id = LocationId(self.locations.len() as u32);
        self.locations.push(Location {
            id,
            name: name.to_string(),
            kind,
            capacity,
        });
        self.revision += 1;
        id
    }

    /// Add a route. Endpoints must exist and the numbers must make sense.
    pub fn add_route(&mut self, spec: RouteSpec) -> Result<RouteId> {
        let invalid = |reason| LogisticsError::InvalidRoute {
            source_id: spec.source,
            target: spec.target,
            reason,
        };
        self.location(spec.source)?;
        self.location(spec.target)?;
        if !spec.base_cost.is_finite() || spec.base_cost < 0.0 {
            return Err(invalid("base cost must be a non-negative number"));
        }
        if spec.transit_days == 0 {
            return Err(invalid("transit days must be positive"));
        }
        if spec.capacity == 0 {
            return Err(invalid("capacity must be positive"));
        }

        let id = RouteId(self.routes.len() as u32);
        self.routes.push(Route {
            id,
            source: spec.source,
            target: spec.target,
            transport_mode: spec.transport_mode,
            base_cost: spec.base_cost,
            transit_days: spec.transit_days,
            capacity: spec.capacity,
            is_active: true,
            weather_vulnerable: spec.weather_vulnerable,
        });
        self.revision += 1;
        Ok(id)
    }

    pub fn location(&self, id: LocationId) -> Result<&Location> {
        self.locations
            .get(id.0 as usize)
            .ok_or(LogisticsError::UnknownLocation(id))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route> {
        self.routes
            .get(id.0 as usize)
            .ok_or(LogisticsError::UnknownRoute(id))
    }

    pub fn has_location(&self, id: LocationId) -> bool {
        (id.0 as usize) < self.locations.len()
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn active_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|r| r.is_active)
    }

    /// Outgoing routes of a location, active or not, in insertion order.
    pub fn routes_from(&self, id: LocationId) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |r| r.source == id)
    }

    /// Active routes running `source -> target` (all transport modes).
    pub fn active_routes_between(
        &self,
        source: LocationId,
        target: LocationId,
    ) -> impl Iterator<Item = &Route> {
        self.routes
            .iter()
            .filter(move |r| r.is_active && r.source == source && r.target == target)
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Flip a route's global active flag. Returns the previous value.
    pub fn set_route_active(&mut self, id: RouteId, active: bool) -> Result<bool> {
        let route = self
            .routes
            .get_mut(id.0 as usize)
            .ok_or(LogisticsError::UnknownRoute(id))?;
        let previous = route.is_active;
        if previous != active {
            route.is_active = active;
            self.revision += 1;
        }
        Ok(previous)
    }

    /// Overwrite a location's capacity. Returns the previous value.
    pub fn set_location_capacity(&mut self, id: LocationId, capacity: u32) -> Result<u32> {
        let location = self
            .locations
            .get_mut(id.0 as usize)
            .ok_or(LogisticsError::UnknownLocation(id))?;
        let previous = location.capacity;
        if previous != capacity {
            location.capacity = capacity;
            self.revision += 1;
        }
        Ok(previous)
    }
}
