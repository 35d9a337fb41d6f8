//! Vehicle data objects.
//!
//! # Design
//!
//! [`VehicleData`] is the per-step snapshot the federate publishes for every
//! vehicle it owns.  It is assembled from raw simulator subscription samples
//! by the step-result builder; the decoders in this module turn the
//! simulator's packed bitfields into typed values.

use crate::geo::GeoPoint;
use crate::ids::{DetectorId, EdgeId, RouteId, VehicleId, VehicleTypeId};
use crate::time::SimTime;

// ── Road position ─────────────────────────────────────────────────────────────

/// Position of a vehicle within the road network.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadPosition {
    /// The connection (edge) the vehicle is driving on.
    pub connection: EdgeId,
    /// Lane index, 0 = rightmost.
    pub lane_index: u32,
    /// Longitudinal offset from the start of the connection, in metres.
    pub offset: f64,
    /// Lateral offset from the lane centre, in metres.
    pub lateral: f64,
}

// ── Signals ───────────────────────────────────────────────────────────────────

/// State of the vehicle's exterior signals.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VehicleSignals {
    pub blinker_right: bool,
    pub blinker_left:  bool,
    pub blinker_emergency: bool,
    pub brake_light:   bool,
    pub reverse_drive: bool,
}

impl VehicleSignals {
    /// Decode the simulator's signal bitfield.
    ///
    /// Bit 0: right blinker, bit 1: left blinker, bit 2: hazard flashers,
    /// bit 3: brake light, bit 7: reverse gear.  All other bits are ignored.
    pub fn decode(bits: u32) -> VehicleSignals {
        VehicleSignals {
            blinker_right:     bits & (1 << 0) != 0,
            blinker_left:      bits & (1 << 1) != 0,
            blinker_emergency: bits & (1 << 2) != 0,
            brake_light:       bits & (1 << 3) != 0,
            reverse_drive:     bits & (1 << 7) != 0,
        }
    }
}

// ── Stop mode ─────────────────────────────────────────────────────────────────

/// Whether (and how) a vehicle is deliberately stopped.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StopMode {
    #[default]
    Driving,
    /// Stopped on the lane, blocking it.
    Stopped,
    /// Parked at the roadside, not blocking the lane.
    ParkedRoadside,
    /// Parked inside a parking area.
    ParkedParkingArea,
}

impl StopMode {
    /// Decode the simulator's stopped-state bitfield.
    ///
    /// Bit 0: stopped, bit 1: parked at the roadside, bit 7: parked in a
    /// parking area.  Parking bits win over the plain stop bit.
    pub fn decode(bits: u32) -> StopMode {
        if bits & (1 << 7) != 0 {
            StopMode::ParkedParkingArea
        } else if bits & (1 << 1) != 0 {
            StopMode::ParkedRoadside
        } else if bits & (1 << 0) != 0 {
            StopMode::Stopped
        } else {
            StopMode::Driving
        }
    }

    /// Encode into the bitfield used by the stop command.
    pub fn encode(self) -> u32 {
        match self {
            StopMode::Driving => 0,
            StopMode::Stopped => 1 << 0,
            StopMode::ParkedRoadside => 1 << 1,
            StopMode::ParkedParkingArea => 1 << 7,
        }
    }

    #[inline]
    pub fn is_parking(self) -> bool {
        matches!(self, StopMode::ParkedRoadside | StopMode::ParkedParkingArea)
    }
}

// ── Consumptions & emissions ──────────────────────────────────────────────────

/// Fuel/energy consumed, in millilitres (or Wh for electric types).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Consumptions {
    pub fuel: f64,
}

impl Consumptions {
    #[inline]
    pub fn accumulate(self, delta: Consumptions) -> Consumptions {
        Consumptions { fuel: self.fuel + delta.fuel }
    }
}

/// Pollutants emitted, in milligrams.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Emissions {
    pub co2: f64,
    pub co:  f64,
    pub hc:  f64,
    pub pmx: f64,
    pub nox: f64,
}

impl Emissions {
    #[inline]
    pub fn accumulate(self, delta: Emissions) -> Emissions {
        Emissions {
            co2: self.co2 + delta.co2,
            co:  self.co + delta.co,
            hc:  self.hc + delta.hc,
            pmx: self.pmx + delta.pmx,
            nox: self.nox + delta.nox,
        }
    }
}

/// Consumption over the last step plus the running total.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct VehicleConsumptions {
    pub current: Consumptions,
    pub total:   Consumptions,
}

/// Emissions over the last step plus the running total.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct VehicleEmissions {
    pub current: Emissions,
    pub total:   Emissions,
}

// ── Distance sensors & sight ──────────────────────────────────────────────────

/// Derived distance-sensor readings.
///
/// A disabled sensor reads `-1.0`; an enabled sensor with nothing in range
/// reads `f64::INFINITY`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VehicleSensors {
    pub front_distance: f64,
    pub rear_distance:  f64,
    /// Speed of the leading vehicle.  Reads `-1.0` when the front sensor is
    /// disabled or the leader's speed is unknown.
    pub leader_speed:   f64,
}

/// A vehicle perceived within the field-of-vision subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct SurroundingVehicle {
    pub id:       VehicleId,
    pub position: GeoPoint,
    pub speed:    f64,
}

// ── Vehicle type ──────────────────────────────────────────────────────────────

/// Coarse vehicle category, mapped onto the simulator's emission/permission
/// classes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VehicleClass {
    #[default]
    Car,
    LightGoodsVehicle,
    HeavyGoodsVehicle,
    PublicTransportVehicle,
    EmergencyVehicle,
    VehicleWithTrailer,
    MotorCycle,
    Bicycle,
    ElectricVehicle,
}

impl VehicleClass {
    /// Every class, in declaration order.
    pub const ALL: [VehicleClass; 9] = [
        VehicleClass::Car,
        VehicleClass::LightGoodsVehicle,
        VehicleClass::HeavyGoodsVehicle,
        VehicleClass::PublicTransportVehicle,
        VehicleClass::EmergencyVehicle,
        VehicleClass::VehicleWithTrailer,
        VehicleClass::MotorCycle,
        VehicleClass::Bicycle,
        VehicleClass::ElectricVehicle,
    ];

    /// The simulator's class string for this category.
    pub fn simulator_class(self) -> &'static str {
        match self {
            VehicleClass::Car => "passenger",
            VehicleClass::LightGoodsVehicle => "delivery",
            VehicleClass::HeavyGoodsVehicle => "truck",
            VehicleClass::PublicTransportVehicle => "bus",
            VehicleClass::EmergencyVehicle => "emergency",
            VehicleClass::VehicleWithTrailer => "trailer",
            VehicleClass::MotorCycle => "motorcycle",
            VehicleClass::Bicycle => "bicycle",
            VehicleClass::ElectricVehicle => "evehicle",
        }
    }

    /// Heavy vehicles are kept on the rightmost lane when the "highway"
    /// departure-lane policy is in effect.
    #[inline]
    pub fn is_heavy(self) -> bool {
        matches!(
            self,
            VehicleClass::HeavyGoodsVehicle | VehicleClass::VehicleWithTrailer
        )
    }
}

/// Static parameters of a vehicle type.
///
/// Scenario types are declared once during type initialization; a
/// registration may then override single fields per vehicle, which the
/// lifecycle reconciler pushes to the simulator after insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleType {
    pub id:               VehicleTypeId,
    pub vehicle_class:    VehicleClass,
    /// Vehicle length in metres.
    pub length:           f64,
    /// Minimum standstill gap to the leader, in metres.
    pub min_gap:          f64,
    /// Maximum velocity in m/s.
    pub max_speed:        f64,
    /// Maximum acceleration in m/s².
    pub max_acceleration: f64,
    /// Maximum (comfortable) deceleration in m/s².
    pub max_deceleration: f64,
    /// Driver reaction time (time gap) in seconds.
    pub reaction_time:    f64,
    /// Multiplier on the speed limit this driver aims for.
    pub speed_factor:     f64,
    /// Driver imperfection (0 = perfect).
    pub sigma:            f64,
    /// Display color, e.g. `"red"` or `"#ff0000"`.
    pub color:            Option<String>,
}

// ── VehicleData ───────────────────────────────────────────────────────────────

/// Snapshot of one simulator-owned vehicle at the end of a step.
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleData {
    /// Timestamp of the step this snapshot belongs to.
    pub time:              SimTime,
    pub id:                VehicleId,
    /// Geographic position, absent while the vehicle has no valid position
    /// (e.g. waiting inside a parking area).
    pub position:          Option<GeoPoint>,
    pub road:              Option<RoadPosition>,
    /// Velocity in m/s.
    pub speed:             f64,
    /// Acceleration over the last step in m/s², derived from the speed delta.
    pub acceleration:      f64,
    /// Odometer since insertion, in metres.
    pub distance_driven:   f64,
    /// Compass heading in degrees.
    pub heading:           f64,
    /// Road slope at the current position, in degrees.
    pub slope:             f64,
    pub route_id:          Option<RouteId>,
    pub signals:           VehicleSignals,
    pub stop_mode:         StopMode,
    pub consumptions:      VehicleConsumptions,
    pub emissions:         VehicleEmissions,
    /// Present once distance sensors have been activated for this vehicle.
    pub sensors:           Option<VehicleSensors>,
    /// Lane-area detector currently containing this vehicle, if any.
    pub lane_area:         Option<DetectorId>,
    /// Vehicles within the configured sight distance, if subscribed.
    pub vehicles_in_sight: Vec<SurroundingVehicle>,
}
