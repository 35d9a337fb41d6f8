//! Route data object.

use crate::ids::{EdgeId, RouteId};

/// A named sequence of connections through the road network.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleRoute {
    pub id: RouteId,
    pub edges: Vec<EdgeId>,
}

impl VehicleRoute {
    pub fn new(id: impl Into<RouteId>, edges: Vec<EdgeId>) -> Self {
        Self { id: id.into(), edges }
    }
}
