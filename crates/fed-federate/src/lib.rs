//! `fed-federate` — the co-simulation federate wrapping an external traffic
//! simulator.
//!
//! # Design
//!
//! The federate is driven entirely by time-advance grants from the
//! coordination runtime.  Interactions arriving between grants land in the
//! [`InteractionBuffer`]; when a grant is processed they are dispatched in
//! arrival order, the simulator is stepped, and the step's results are
//! published through the [`RtiSink`].
//!
//! | Module        | Contents                                                |
//! |---------------|---------------------------------------------------------|
//! | [`ambassador`]| [`FederateAmbassador`]: grant processing and dispatch   |
//! | [`buffer`]    | [`InteractionBuffer`]: FIFO delivery buffer             |
//! | [`lifecycle`] | [`LifecycleReconciler`]: insertion, subscription, mirror|
//! | [`routes`]    | [`RouteCache`]: dedup and mid-route cutting             |
//! | [`deferred`]  | [`DeferredEventScheduler`]: ramp completions            |
//! | [`interaction`]| Inbound [`Interaction`] and outbound [`Outbound`] types|
//! | [`context`]   | [`RtiSink`]                                             |
//! | [`error`]     | `FederateError`, `FederateResult`                       |

pub mod ambassador;
pub mod buffer;
pub mod context;
pub mod deferred;
pub mod error;
pub mod interaction;
pub mod lifecycle;
pub mod routes;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ambassador::FederateAmbassador;
pub use buffer::InteractionBuffer;
pub use context::RtiSink;
pub use deferred::{DeferredEffect, DeferredEventScheduler};
pub use error::{FederateError, FederateResult};
pub use interaction::{
    Interaction, LaneChangeTarget, LaneSelection, Outbound, SignalCommand, SpeedChange,
    SpeedSelection, TrafficSign, VehicleDeparture, VehicleParameter, VehicleRegistration,
};
pub use lifecycle::LifecycleReconciler;
pub use routes::{CacheOutcome, RouteCache};
