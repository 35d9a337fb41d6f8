//! Sliding-window traffic-flow aggregation for induction loops.

use std::collections::VecDeque;

use fed_core::SimTime;

/// Turns per-step pass counts into a traffic flow in vehicles per hour.
///
/// Pass counts are kept for the configured window; the flow is the windowed
/// total extrapolated to an hour, so short windows react quickly at the cost
/// of coarser quantization.
#[derive(Clone, Debug)]
pub struct FlowTracker {
    window: SimTime,
    passes: VecDeque<(SimTime, u32)>,
}

impl FlowTracker {
    pub fn new(window: SimTime) -> FlowTracker {
        FlowTracker { window, passes: VecDeque::new() }
    }

    /// Record the vehicles that completed a pass during the step at `time`.
    pub fn record(&mut self, time: SimTime, count: u32) {
        if count > 0 {
            self.passes.push_back((time, count));
        }
    }

    /// Flow over the window ending at `now`, in veh/h.
    pub fn flow_veh_per_hour(&mut self, now: SimTime) -> f64 {
        let horizon = SimTime(now.0.saturating_sub(self.window.0));
        while let Some(&(t, _)) = self.passes.front() {
            if t <= horizon {
                self.passes.pop_front();
            } else {
                break;
            }
        }
        let total: u32 = self.passes.iter().map(|&(_, c)| c).sum();
        total as f64 * 3_600.0 / self.window.as_seconds_f64()
    }
}
