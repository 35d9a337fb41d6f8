//! Vehicle-control facade.

use fed_core::{EdgeId, GeoPoint, PositionSyncMode, RouteId, SimTime, VehicleId, VehicleTypeId};

use crate::error::BridgeResult;

/// Resolved departure lane handed to the simulator.
///
/// Policy resolution (heavy-vehicle split, index fallback) happens in the
/// lifecycle reconciler; by the time a value reaches the bridge it is one of
/// the simulator's native placement strategies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DepartLane {
    Random,
    Free,
    Allowed,
    Best,
    First,
    Index(u32),
}

/// Resolved departure speed handed to the simulator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DepartSpeed {
    Precise(f64),
    Random,
    Maximum,
}

/// Commands addressing a single vehicle.
///
/// Every method is a thin, typed wrapper over one simulator command; no
/// bookkeeping happens here.
pub trait VehicleControl {
    #[allow(clippy::too_many_arguments)]
    fn add_vehicle(
        &mut self,
        vehicle: &VehicleId,
        route: &RouteId,
        vehicle_type: &VehicleTypeId,
        lane: DepartLane,
        position: f64,
        speed: DepartSpeed,
    ) -> BridgeResult<()>;

    fn remove_vehicle(&mut self, vehicle: &VehicleId) -> BridgeResult<()>;

    /// Decelerate linearly to `speed` over `duration`.
    fn slow_down(&mut self, vehicle: &VehicleId, speed: f64, duration: SimTime)
        -> BridgeResult<()>;

    /// Set the speed immediately.  A negative value returns control to the
    /// car-following model.
    fn set_speed(&mut self, vehicle: &VehicleId, speed: f64) -> BridgeResult<()>;

    fn change_lane(&mut self, vehicle: &VehicleId, lane_index: u32, duration: SimTime)
        -> BridgeResult<()>;

    fn set_route(&mut self, vehicle: &VehicleId, route: &RouteId) -> BridgeResult<()>;

    #[allow(clippy::too_many_arguments)]
    fn stop(
        &mut self,
        vehicle: &VehicleId,
        edge: &EdgeId,
        position: f64,
        lane_index: u32,
        duration: SimTime,
        stop_flags: u32,
    ) -> BridgeResult<()>;

    fn resume(&mut self, vehicle: &VehicleId) -> BridgeResult<()>;

    /// Re-position the vehicle at an explicit coordinate.
    fn move_to(
        &mut self,
        vehicle: &VehicleId,
        position: GeoPoint,
        heading: f64,
        mode: PositionSyncMode,
    ) -> BridgeResult<()>;

    /// Draw attention to the vehicle in the simulator GUI.
    fn highlight(&mut self, vehicle: &VehicleId, color: &str) -> BridgeResult<()>;

    /// Recompute the vehicle's lane preferences after lane properties changed.
    fn update_best_lanes(&mut self, vehicle: &VehicleId) -> BridgeResult<()>;

    // ── Per-parameter setters ─────────────────────────────────────────────

    fn set_max_speed(&mut self, vehicle: &VehicleId, speed: f64) -> BridgeResult<()>;
    fn set_max_acceleration(&mut self, vehicle: &VehicleId, accel: f64) -> BridgeResult<()>;
    fn set_max_deceleration(&mut self, vehicle: &VehicleId, decel: f64) -> BridgeResult<()>;
    fn set_minimum_gap(&mut self, vehicle: &VehicleId, gap: f64) -> BridgeResult<()>;
    fn set_reaction_time(&mut self, vehicle: &VehicleId, tau: f64) -> BridgeResult<()>;
    fn set_speed_factor(&mut self, vehicle: &VehicleId, factor: f64) -> BridgeResult<()>;
    fn set_imperfection(&mut self, vehicle: &VehicleId, sigma: f64) -> BridgeResult<()>;
    fn set_vehicle_length(&mut self, vehicle: &VehicleId, length: f64) -> BridgeResult<()>;
    fn set_lane_change_mode(&mut self, vehicle: &VehicleId, mode: u32) -> BridgeResult<()>;
    fn set_speed_mode(&mut self, vehicle: &VehicleId, mode: u32) -> BridgeResult<()>;
    fn set_color(&mut self, vehicle: &VehicleId, color: &str) -> BridgeResult<()>;
}
