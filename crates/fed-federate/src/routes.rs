//! Route cache.
//!
//! One append-only map of every route the federate has seen, whether it came
//! from initialization, a registration interaction, or discovery in the
//! simulator.  Routes are never mutated or evicted; a second registration
//! under the same id keeps the first definition.

use rustc_hash::FxHashMap;
use tracing::debug;

use fed_core::{RouteId, VehicleRoute};

use crate::error::{FederateError, FederateResult};

/// Result of inserting a route into the cache.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Inserted,
    AlreadyKnown,
}

#[derive(Default)]
pub struct RouteCache {
    routes: FxHashMap<RouteId, VehicleRoute>,
}

impl RouteCache {
    pub fn new() -> RouteCache {
        RouteCache::default()
    }

    pub fn contains(&self, id: &RouteId) -> bool {
        self.routes.contains_key(id)
    }

    pub fn get(&self, id: &RouteId) -> Option<&VehicleRoute> {
        self.routes.get(id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Insert a route, keeping the existing definition on id collision.
    pub fn insert(&mut self, route: VehicleRoute) -> CacheOutcome {
        if self.routes.contains_key(&route.id) {
            debug!(route = %route.id, "route already known, keeping existing definition");
            return CacheOutcome::AlreadyKnown;
        }
        self.routes.insert(route.id.clone(), route);
        CacheOutcome::Inserted
    }

    /// Derive the suffix of `base` starting at `from_index` for a vehicle
    /// departing mid-route.
    ///
    /// The derived route id is `"{base}_cut{from_index}"`, so repeated cuts
    /// at the same index reuse the cached route.  Returns the derived route
    /// and whether it was newly created (and therefore still unknown to the
    /// simulator).
    pub fn cut_route(
        &mut self,
        base: &RouteId,
        from_index: u32,
    ) -> FederateResult<(VehicleRoute, bool)> {
        let cut_id = RouteId::new(format!("{base}_cut{from_index}"));
        if let Some(existing) = self.routes.get(&cut_id) {
            return Ok((existing.clone(), false));
        }
        let Some(original) = self.routes.get(base) else {
            return Err(FederateError::MissingRoute(base.clone()));
        };
        let edges = original
            .edges
            .iter()
            .skip(from_index as usize)
            .cloned()
            .collect();
        let route = VehicleRoute { id: cut_id.clone(), edges };
        self.routes.insert(cut_id, route.clone());
        Ok((route, true))
    }
}
