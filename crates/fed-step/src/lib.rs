//! `fed-step` — turns raw simulator step samples into publishable batches.
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`builder`] | [`StepResultBuilder`], movement classification, sensors  |
//! | [`flow`]    | [`FlowTracker`]: induction-loop flow aggregation          |

pub mod builder;
pub mod flow;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use builder::{SensorRanges, StepOutput, StepResultBuilder, VehicleMovements};
pub use flow::FlowTracker;
