//! Simulation-control facade: stepping, subscriptions, infrastructure.

use fed_core::{
    DetectorId, EdgeId, SignalGroupDefinition, SignalGroupId, SignalState, SimTime, VehicleId,
};

use crate::error::BridgeResult;
use crate::sample::{SignalGroupSample, StepSample};

/// Commands addressing the simulation as a whole.
pub trait SimulationControl {
    /// Advance the simulator to `time` and collect every subscription result
    /// the steps in between produced.  Blocks until the simulator is done.
    fn simulate_until(&mut self, time: SimTime) -> BridgeResult<Vec<StepSample>>;

    // ── Subscriptions ─────────────────────────────────────────────────────

    fn subscribe_vehicle(
        &mut self,
        vehicle: &VehicleId,
        from: SimTime,
        until: SimTime,
    ) -> BridgeResult<()>;

    /// Subscribe to the set of vehicles within `range_m` of `vehicle`.
    fn subscribe_field_of_vision(
        &mut self,
        vehicle: &VehicleId,
        range_m: f64,
        from: SimTime,
        until: SimTime,
    ) -> BridgeResult<()>;

    fn subscribe_induction_loop(
        &mut self,
        detector: &DetectorId,
        from: SimTime,
        until: SimTime,
    ) -> BridgeResult<()>;

    fn subscribe_lane_area(
        &mut self,
        detector: &DetectorId,
        from: SimTime,
        until: SimTime,
    ) -> BridgeResult<()>;

    fn subscribe_signal_group(
        &mut self,
        group: &SignalGroupId,
        from: SimTime,
        until: SimTime,
    ) -> BridgeResult<()>;

    // ── Lane properties ───────────────────────────────────────────────────

    /// Restrict a lane to the given class names, in the simulator's own
    /// vocabulary.  An empty list closes the lane for everyone.
    fn set_lane_allowed_classes(
        &mut self,
        edge: &EdgeId,
        lane_index: u32,
        classes: &[&str],
    ) -> BridgeResult<()>;

    fn set_lane_disallowed_classes(
        &mut self,
        edge: &EdgeId,
        lane_index: u32,
        classes: &[&str],
    ) -> BridgeResult<()>;

    fn set_lane_max_speed(&mut self, edge: &EdgeId, lane_index: u32, speed: f64)
        -> BridgeResult<()>;

    /// Length of a lane in metres.
    fn lane_length(&mut self, edge: &EdgeId, lane_index: u32) -> BridgeResult<f64>;

    // ── Traffic signals ───────────────────────────────────────────────────

    fn signal_group_ids(&mut self) -> BridgeResult<Vec<SignalGroupId>>;

    fn signal_group_definition(
        &mut self,
        group: &SignalGroupId,
    ) -> BridgeResult<SignalGroupDefinition>;

    /// Current state of a group, queried outside the step cycle.
    fn signal_group_state(&mut self, group: &SignalGroupId) -> BridgeResult<SignalGroupSample>;

    fn set_signal_phase(&mut self, group: &SignalGroupId, phase_index: u32) -> BridgeResult<()>;
    fn set_signal_program(&mut self, group: &SignalGroupId, program_id: &str) -> BridgeResult<()>;
    fn set_signal_remaining_duration(
        &mut self,
        group: &SignalGroupId,
        duration: SimTime,
    ) -> BridgeResult<()>;
    fn set_signal_custom_state(
        &mut self,
        group: &SignalGroupId,
        states: &[SignalState],
    ) -> BridgeResult<()>;

    // ── Pass-through ──────────────────────────────────────────────────────

    /// Execute an opaque, pre-encoded command and return the raw response.
    fn execute_raw(&mut self, payload: &[u8]) -> BridgeResult<Vec<u8>>;
}
