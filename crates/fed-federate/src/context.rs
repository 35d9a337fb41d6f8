//! The federate's handle onto the coordination runtime.

use fed_core::SimTime;

use crate::interaction::Outbound;

/// Where grant processing sends its results.
///
/// Passed explicitly into [`process_time_advance_grant`] rather than stored,
/// so the ambassador never owns a runtime handle and tests can hand in a
/// recording sink.
///
/// [`process_time_advance_grant`]: crate::ambassador::FederateAmbassador::process_time_advance_grant
pub trait RtiSink {
    /// Publish a message to the federation.
    fn publish(&mut self, message: Outbound);

    /// Ask for the next time-advance grant.
    fn request_advance(&mut self, time: SimTime);
}
