//! `fed-core` — foundational types for the traffic co-simulation federate.
//!
//! This crate is a dependency of every other `fed-*` crate.  It has no
//! `fed-*` dependencies and minimal external ones (`thiserror`, `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                 |
//! |--------------|----------------------------------------------------------|
//! | [`ids`]      | Typed string ids (`VehicleId`, `RouteId`, ...)           |
//! | [`time`]     | `SimTime` (nanoseconds) and step-grid snapping           |
//! | [`geo`]      | `GeoPoint`                                               |
//! | [`config`]   | `FederateConfig` JSON loader                             |
//! | [`vehicle`]  | `VehicleData`, `VehicleType`, signal/stop-mode decoders  |
//! | [`detector`] | Induction-loop and lane-area aggregations                |
//! | [`route`]    | `VehicleRoute`                                           |
//! | [`signal`]   | Traffic-signal group state and decoders                  |
//! | [`error`]    | `CoreError`, `CoreResult`                                |

pub mod config;
pub mod detector;
pub mod error;
pub mod geo;
pub mod ids;
pub mod route;
pub mod signal;
pub mod time;
pub mod vehicle;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{FederateConfig, Highlight, PositionSyncMode};
pub use detector::{InductionLoopInfo, LaneAreaInfo};
pub use error::{CoreError, CoreResult};
pub use geo::GeoPoint;
pub use ids::{
    DetectorId, EdgeId, FederateId, RouteId, SignalGroupId, VehicleId, VehicleTypeId,
};
pub use route::VehicleRoute;
pub use signal::{SignalGroupDefinition, SignalGroupInfo, SignalState};
pub use time::SimTime;
pub use vehicle::{
    Consumptions, Emissions, RoadPosition, StopMode, SurroundingVehicle, VehicleClass,
    VehicleConsumptions, VehicleData, VehicleEmissions, VehicleSensors, VehicleSignals,
    VehicleType,
};
