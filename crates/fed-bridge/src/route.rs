//! Route-control facade.

use fed_core::{EdgeId, RouteId, VehicleRoute};

use crate::error::BridgeResult;

/// Commands addressing named routes.
pub trait RouteControl {
    /// All route ids currently known to the simulator.
    fn route_ids(&mut self) -> BridgeResult<Vec<RouteId>>;

    /// The edges of an existing route.
    fn route_edges(&mut self, route: &RouteId) -> BridgeResult<Vec<EdgeId>>;

    /// Declare a new route to the simulator.
    fn add_route(&mut self, route: &VehicleRoute) -> BridgeResult<()>;
}
