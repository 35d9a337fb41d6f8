//! Simulation time model.
//!
//! # Design
//!
//! Time is a `u64` nanosecond count since simulation start, matching the
//! resolution of the coordination runtime's time-advance grants.  The
//! external simulator only ever steps on a fixed grid (one step every
//! `update_interval`), so requested times must be snapped onto that grid
//! before they reach a simulator command — see [`SimTime::snap_to_grid`].

use std::fmt;

/// Nanoseconds per millisecond.
pub const MILLISECOND: u64 = 1_000_000;
/// Nanoseconds per second.
pub const SECOND: u64 = 1_000 * MILLISECOND;

/// An absolute simulation timestamp in nanoseconds.
///
/// `u64` nanoseconds overflow after ~584 years of simulated time, far beyond
/// any scenario length.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[inline]
    pub fn from_millis(ms: u64) -> SimTime {
        SimTime(ms * MILLISECOND)
    }

    #[inline]
    pub fn from_seconds(s: u64) -> SimTime {
        SimTime(s * SECOND)
    }

    /// Fractional seconds, for simulator commands that speak in seconds.
    #[inline]
    pub fn as_seconds_f64(self) -> f64 {
        self.0 as f64 / SECOND as f64
    }

    /// Snap onto the simulator's step grid.
    ///
    /// Rounds to the nearest multiple of `interval` (ties round down), then
    /// clamps to at least one interval so a command can never be scheduled
    /// before the first simulator step.
    pub fn snap_to_grid(self, interval: SimTime) -> SimTime {
        let i = interval.0;
        let rem = self.0 % i;
        let snapped = if rem <= i / 2 {
            self.0 - rem
        } else {
            self.0 + (i - rem)
        };
        SimTime(snapped.max(i))
    }
}

impl std::ops::Add for SimTime {
    type Output = SimTime;
    #[inline]
    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;
    #[inline]
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / SECOND, (self.0 % SECOND) / MILLISECOND)
    }
}
