//! Interactions exchanged with the coordination runtime.
//!
//! Inbound interactions arrive through the [`InteractionBuffer`] and are
//! dispatched when the next time-advance grant is processed; outbound
//! messages leave through the [`RtiSink`].
//!
//! [`InteractionBuffer`]: crate::buffer::InteractionBuffer
//! [`RtiSink`]: crate::context::RtiSink

use fed_core::{
    DetectorId, EdgeId, FederateId, GeoPoint, InductionLoopInfo, LaneAreaInfo, RouteId,
    SignalGroupDefinition, SignalGroupId, SignalGroupInfo, SignalState, SimTime, StopMode,
    VehicleClass, VehicleId, VehicleRoute, VehicleType,
};
use fed_step::VehicleMovements;

// ── Vehicle departure ─────────────────────────────────────────────────────────

/// Departure-lane policy requested by a vehicle registration.
///
/// Resolved to one of the simulator's native placement strategies at
/// insertion time; `Highway` keeps heavy vehicles on the rightmost lane.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LaneSelection {
    Random,
    Free,
    Allowed,
    Best,
    First,
    Highway,
    Index(u32),
}

/// Departure-speed policy requested by a vehicle registration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SpeedSelection {
    Precise(f64),
    Random,
    Maximum,
}

/// When, where, and how a registered vehicle enters the simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleDeparture {
    /// Earliest simulation time of the insertion attempt.
    pub time: SimTime,
    pub route: RouteId,
    /// Index of the connection along the route the vehicle departs from.
    /// Non-zero indices cut the route's already-driven prefix off.
    pub connection_index: u32,
    pub lane: LaneSelection,
    /// Longitudinal departure position on the connection, metres.
    pub position: f64,
    pub speed: SpeedSelection,
}

/// Announcement of a vehicle this federate should insert and simulate.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleRegistration {
    pub time: SimTime,
    pub vehicle: VehicleId,
    /// The resolved vehicle type, including per-vehicle overrides of the
    /// scenario type it was derived from.
    pub vehicle_type: VehicleType,
    pub departure: VehicleDeparture,
    /// Whether application logic is mapped onto the vehicle.  Drives the
    /// subscription decision when not subscribing to all vehicles.
    pub has_applications: bool,
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// A speed-change request.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SpeedChange {
    /// Return control to the car-following model.
    Reset,
    /// Reach `speed`, ramping linearly over `ramp` (immediate when zero).
    Set { speed: f64, ramp: SimTime },
}

/// Target of a lane-change request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LaneChangeTarget {
    ToLeft,
    ToRight,
    ToRightmost,
    ByIndex(u32),
    Stay,
}

/// A single mutable vehicle parameter.
#[derive(Clone, Debug, PartialEq)]
pub enum VehicleParameter {
    MaxSpeed(f64),
    MaxAcceleration(f64),
    MaxDeceleration(f64),
    MinimumGap(f64),
    ReactionTime(f64),
    SpeedFactor(f64),
    Imperfection(f64),
    SpeedMode(u32),
    LaneChangeMode(u32),
    Color(String),
}

/// A signal-group control request.
#[derive(Clone, Debug, PartialEq)]
pub enum SignalCommand {
    Phase(u32),
    Program(String),
    RemainingDuration(SimTime),
    CustomState(Vec<SignalState>),
}

/// A variable traffic sign managed through the simulator GUI.
#[derive(Clone, Debug, PartialEq)]
pub enum TrafficSign {
    SpeedLimit { sign_id: String, position: GeoPoint, speed: f64 },
    LaneAssignment { sign_id: String, position: GeoPoint, lanes: Vec<u32> },
}

// ── Inbound interactions ──────────────────────────────────────────────────────

/// Every interaction type this federate consumes.
#[derive(Clone, Debug, PartialEq)]
pub enum Interaction {
    VehicleTypesInitialization {
        time: SimTime,
        types: Vec<VehicleType>,
    },
    RoutesInitialization {
        time: SimTime,
        routes: Vec<VehicleRoute>,
    },
    VehicleRegistration(VehicleRegistration),
    /// A vehicle was assigned to another federate: its movements will be
    /// mirrored here instead of simulated.
    VehicleFederateAssignment {
        time: SimTime,
        vehicle: VehicleId,
        federate: FederateId,
    },
    /// Movements of vehicles simulated by another federate.
    VehicleUpdates {
        time: SimTime,
        origin: FederateId,
        movements: VehicleMovements,
    },
    RouteRegistration {
        time: SimTime,
        route: VehicleRoute,
    },
    VehicleSlowDown {
        time: SimTime,
        vehicle: VehicleId,
        speed: f64,
        duration: SimTime,
    },
    VehicleSpeedChange {
        time: SimTime,
        vehicle: VehicleId,
        change: SpeedChange,
    },
    VehicleLaneChange {
        time: SimTime,
        vehicle: VehicleId,
        target: LaneChangeTarget,
        duration: SimTime,
    },
    VehicleStop {
        time: SimTime,
        vehicle: VehicleId,
        edge: EdgeId,
        position: f64,
        lane_index: u32,
        duration: SimTime,
        mode: StopMode,
    },
    VehicleResume {
        time: SimTime,
        vehicle: VehicleId,
    },
    VehicleRouteChange {
        time: SimTime,
        vehicle: VehicleId,
        route: RouteId,
    },
    VehicleParameterChange {
        time: SimTime,
        vehicle: VehicleId,
        parameters: Vec<VehicleParameter>,
    },
    /// Activate front/rear distance sensors for a vehicle.
    VehicleSensorActivation {
        time: SimTime,
        vehicle: VehicleId,
        front_range: Option<f64>,
        rear_range: Option<f64>,
    },
    /// Subscribe to the vehicles within sight of a vehicle.
    VehicleSightDistanceConfiguration {
        time: SimTime,
        vehicle: VehicleId,
        range_m: f64,
    },
    InductionLoopSubscription {
        time: SimTime,
        detector: DetectorId,
    },
    LaneAreaSubscription {
        time: SimTime,
        detector: DetectorId,
    },
    SignalGroupSubscription {
        time: SimTime,
        group: SignalGroupId,
    },
    SignalStateChange {
        time: SimTime,
        group: SignalGroupId,
        command: SignalCommand,
    },
    LanePropertyChange {
        time: SimTime,
        edge: EdgeId,
        lane_index: u32,
        allowed: Option<Vec<VehicleClass>>,
        disallowed: Option<Vec<VehicleClass>>,
        max_speed: Option<f64>,
    },
    TrafficSignRegistration {
        time: SimTime,
        sign: TrafficSign,
    },
    TrafficSignSpeedLimitChange {
        time: SimTime,
        sign_id: String,
        speed: f64,
    },
    TrafficSignLaneAssignmentChange {
        time: SimTime,
        sign_id: String,
        lanes: Vec<u32>,
    },
    /// An opaque, pre-encoded simulator command with a correlated response.
    RawCommand {
        time: SimTime,
        request_id: u64,
        payload: Vec<u8>,
    },
    /// An interaction type this federate does not understand.  Logged and
    /// discarded; never an error.
    Foreign {
        time: SimTime,
        type_id: String,
    },
}

impl Interaction {
    /// The interaction's own timestamp.
    pub fn time(&self) -> SimTime {
        match self {
            Interaction::VehicleTypesInitialization { time, .. }
            | Interaction::RoutesInitialization { time, .. }
            | Interaction::VehicleFederateAssignment { time, .. }
            | Interaction::VehicleUpdates { time, .. }
            | Interaction::RouteRegistration { time, .. }
            | Interaction::VehicleSlowDown { time, .. }
            | Interaction::VehicleSpeedChange { time, .. }
            | Interaction::VehicleLaneChange { time, .. }
            | Interaction::VehicleStop { time, .. }
            | Interaction::VehicleResume { time, .. }
            | Interaction::VehicleRouteChange { time, .. }
            | Interaction::VehicleParameterChange { time, .. }
            | Interaction::VehicleSensorActivation { time, .. }
            | Interaction::VehicleSightDistanceConfiguration { time, .. }
            | Interaction::InductionLoopSubscription { time, .. }
            | Interaction::LaneAreaSubscription { time, .. }
            | Interaction::SignalGroupSubscription { time, .. }
            | Interaction::SignalStateChange { time, .. }
            | Interaction::LanePropertyChange { time, .. }
            | Interaction::TrafficSignRegistration { time, .. }
            | Interaction::TrafficSignSpeedLimitChange { time, .. }
            | Interaction::TrafficSignLaneAssignmentChange { time, .. }
            | Interaction::RawCommand { time, .. }
            | Interaction::Foreign { time, .. } => *time,
            Interaction::VehicleRegistration(r) => r.time,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Interaction::VehicleTypesInitialization { .. } => "VehicleTypesInitialization",
            Interaction::RoutesInitialization { .. } => "RoutesInitialization",
            Interaction::VehicleRegistration(_) => "VehicleRegistration",
            Interaction::VehicleFederateAssignment { .. } => "VehicleFederateAssignment",
            Interaction::VehicleUpdates { .. } => "VehicleUpdates",
            Interaction::RouteRegistration { .. } => "RouteRegistration",
            Interaction::VehicleSlowDown { .. } => "VehicleSlowDown",
            Interaction::VehicleSpeedChange { .. } => "VehicleSpeedChange",
            Interaction::VehicleLaneChange { .. } => "VehicleLaneChange",
            Interaction::VehicleStop { .. } => "VehicleStop",
            Interaction::VehicleResume { .. } => "VehicleResume",
            Interaction::VehicleRouteChange { .. } => "VehicleRouteChange",
            Interaction::VehicleParameterChange { .. } => "VehicleParameterChange",
            Interaction::VehicleSensorActivation { .. } => "VehicleSensorActivation",
            Interaction::VehicleSightDistanceConfiguration { .. } => {
                "VehicleSightDistanceConfiguration"
            }
            Interaction::InductionLoopSubscription { .. } => "InductionLoopSubscription",
            Interaction::LaneAreaSubscription { .. } => "LaneAreaSubscription",
            Interaction::SignalGroupSubscription { .. } => "SignalGroupSubscription",
            Interaction::SignalStateChange { .. } => "SignalStateChange",
            Interaction::LanePropertyChange { .. } => "LanePropertyChange",
            Interaction::TrafficSignRegistration { .. } => "TrafficSignRegistration",
            Interaction::TrafficSignSpeedLimitChange { .. } => "TrafficSignSpeedLimitChange",
            Interaction::TrafficSignLaneAssignmentChange { .. } => {
                "TrafficSignLaneAssignmentChange"
            }
            Interaction::RawCommand { .. } => "RawCommand",
            Interaction::Foreign { .. } => "Foreign",
        }
    }
}

// ── Outbound messages ─────────────────────────────────────────────────────────

/// Every message this federate publishes to the coordination runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    /// Movements of the vehicles this federate owns, once per step.
    VehicleMovements(VehicleMovements),
    /// Stationary-detector aggregations, once per step when subscribed.
    DetectorUpdates {
        time: SimTime,
        induction_loops: Vec<InductionLoopInfo>,
        lane_areas: Vec<LaneAreaInfo>,
    },
    /// Signal-group states, once per step when subscribed and immediately
    /// after a signal command was applied.
    SignalGroupUpdates {
        time: SimTime,
        groups: Vec<SignalGroupInfo>,
    },
    /// A route discovered in the simulator that the federation does not
    /// know yet.
    RouteRegistration(VehicleRoute),
    /// Static signal infrastructure, published once after connecting.
    SignalGroupRegistration(Vec<SignalGroupDefinition>),
    /// Response to a [`Interaction::RawCommand`].
    RawCommandResponse { request_id: u64, payload: Vec<u8> },
}
