//! `fed-bridge` — the seam between the federate and the external traffic
//! simulator.
//!
//! # Design
//!
//! The simulator is reached through four capability facades, one trait per
//! concern.  Concrete bridges (TCP command protocol, in-process library)
//! implement all four; the rest of the federate only ever sees the traits,
//! which keeps the command encoding swappable and the grant-processing logic
//! testable against in-memory mocks.
//!
//! | Module         | Contents                                             |
//! |----------------|------------------------------------------------------|
//! | [`vehicle`]    | [`VehicleControl`], departure lane/speed values      |
//! | [`simulation`] | [`SimulationControl`]: stepping and subscriptions    |
//! | [`route`]      | [`RouteControl`]                                     |
//! | [`poi`]        | [`PoiControl`]: variable traffic signs               |
//! | [`sample`]     | Raw per-step subscription results                    |
//! | [`connect`]    | Handshake with bounded retry                         |
//! | [`error`]      | `BridgeError`, `BridgeResult`                        |

pub mod connect;
pub mod error;
pub mod poi;
pub mod route;
pub mod sample;
pub mod simulation;
pub mod vehicle;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use connect::{connect_with_retry, Connector, RetryPolicy};
pub use error::{BridgeError, BridgeResult};
pub use poi::PoiControl;
pub use route::RouteControl;
pub use sample::{
    InductionLoopSample, LaneAreaSample, Neighbor, SeenVehicle, SignalGroupSample, StepSample,
    VehicleContextSample, VehicleSample,
};
pub use simulation::SimulationControl;
pub use vehicle::{DepartLane, DepartSpeed, VehicleControl};

/// Everything a full simulator connection provides.
///
/// Blanket-implemented for any type that implements the four facades, so a
/// concrete bridge never names this trait.
pub trait SimulatorBridge:
    VehicleControl + SimulationControl + RouteControl + PoiControl
{
}

impl<T> SimulatorBridge for T where
    T: VehicleControl + SimulationControl + RouteControl + PoiControl
{
}
