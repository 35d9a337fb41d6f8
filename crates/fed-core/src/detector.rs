//! Aggregated stationary-detector results.

use crate::ids::{DetectorId, VehicleId};

/// Per-step aggregation of one induction loop.
#[derive(Clone, Debug, PartialEq)]
pub struct InductionLoopInfo {
    pub id: DetectorId,
    /// Mean speed of vehicles on the loop, m/s.
    pub mean_speed: f64,
    /// Mean length of vehicles on the loop, metres.
    pub mean_vehicle_length: f64,
    /// Traffic flow over the configured measurement window, veh/h.
    pub flow_veh_per_hour: f64,
}

/// Per-step aggregation of one lane-area detector.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneAreaInfo {
    pub id: DetectorId,
    /// Detector length in metres.
    pub length: f64,
    pub vehicle_count: u32,
    pub halting_vehicles: u32,
    /// Mean speed of contained vehicles, m/s.
    pub mean_speed: f64,
    /// Vehicles per kilometre over the detector's length.
    pub density_veh_per_km: f64,
    pub vehicles: Vec<VehicleId>,
}

impl LaneAreaInfo {
    /// Traffic density from a raw count and detector length.
    #[inline]
    pub fn density(vehicle_count: u32, length_m: f64) -> f64 {
        if length_m <= 0.0 {
            0.0
        } else {
            vehicle_count as f64 * 1_000.0 / length_m
        }
    }
}
