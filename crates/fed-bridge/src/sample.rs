//! Raw subscription samples delivered by one simulator step.
//!
//! These are the simulator's view, undecoded: packed bitfields, per-second
//! emission rates, and positions that may be invalid.  The step-result
//! builder turns them into published data objects.

use fed_core::{DetectorId, EdgeId, GeoPoint, RouteId, SignalGroupId, VehicleId};

/// Leader/follower relationship reported by a vehicle subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub id: VehicleId,
    /// Net gap in metres (bumper to bumper, excluding min-gap).
    pub distance: f64,
}

/// One vehicle's raw subscription result for one step.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSample {
    pub id: VehicleId,
    /// `None` when the simulator reports no valid position, e.g. while the
    /// vehicle waits inside a parking area or was teleported away.
    pub position: Option<GeoPoint>,
    pub edge: Option<EdgeId>,
    pub lane_index: u32,
    /// Longitudinal position on the edge, metres.
    pub lane_position: f64,
    /// Lateral offset from the lane centre, metres.
    pub lateral_lane_position: f64,
    pub speed: f64,
    pub distance_driven: f64,
    pub heading: f64,
    pub slope: f64,
    pub route_id: Option<RouteId>,
    /// Packed exterior-signal bitfield.
    pub signals_encoded: u32,
    /// Packed stopped-state bitfield.
    pub stopped_state_encoded: u32,
    pub min_gap: f64,
    // Emission and consumption rates, per second of simulated time.
    pub co2: f64,
    pub co: f64,
    pub hc: f64,
    pub pmx: f64,
    pub nox: f64,
    pub fuel: f64,
    pub leader: Option<Neighbor>,
    pub follower: Option<Neighbor>,
}

/// One induction loop's raw result for one step.
#[derive(Clone, Debug, PartialEq)]
pub struct InductionLoopSample {
    pub id: DetectorId,
    pub mean_speed: f64,
    pub mean_vehicle_length: f64,
    /// Vehicles that completed a pass over the loop during this step.
    pub passed_vehicles: u32,
}

/// One lane-area detector's raw result for one step.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneAreaSample {
    pub id: DetectorId,
    pub length: f64,
    pub vehicle_count: u32,
    pub halting_vehicles: u32,
    pub mean_speed: f64,
    /// Ids of vehicles currently on the detector, in detector order.
    pub vehicles: Vec<VehicleId>,
}

/// One signal group's raw result for one step.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalGroupSample {
    pub id: SignalGroupId,
    pub program_id: String,
    pub phase_index: u32,
    /// Simulated seconds until the next phase switch, absolute.
    pub next_switch_s: f64,
    /// One character per signal, simulator encoding.
    pub states: String,
}

/// Field-of-vision result: vehicles around a subscribed vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleContextSample {
    pub id: VehicleId,
    pub seen: Vec<SeenVehicle>,
}

/// A vehicle perceived by a field-of-vision subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct SeenVehicle {
    pub id: VehicleId,
    pub position: GeoPoint,
    pub speed: f64,
}

/// Everything one simulator step produced, in simulator delivery order.
#[derive(Clone, Debug, PartialEq)]
pub enum StepSample {
    Vehicle(VehicleSample),
    InductionLoop(InductionLoopSample),
    LaneArea(LaneAreaSample),
    SignalGroup(SignalGroupSample),
    VehicleContext(VehicleContextSample),
}
