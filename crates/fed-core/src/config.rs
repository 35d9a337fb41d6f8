//! Federate configuration.
//!
//! Loaded from a JSON file by the embedding process.  Every field has a
//! default, so an empty object `{}` is a valid configuration.  Field names
//! are camelCase on disk to match the deployment tooling's conventions.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::time::SimTime;

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Vehicle actions optionally highlighted in the simulator GUI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Highlight {
    ChangeLane,
    ChangeRoute,
}

/// How the simulator resolves an explicit re-position of a vehicle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSyncMode {
    /// Map to the closest edge, switching the route if necessary.
    SwitchRoute,
    /// Map to the closest position on the current route.
    KeepRoute,
    /// Place at the exact coordinate regardless of the road network.
    ExactPosition,
}

// ── FederateConfig ────────────────────────────────────────────────────────────

/// Top-level federate configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FederateConfig {
    /// Simulator step length and result publication interval, in
    /// milliseconds.  Minimum 100.
    #[serde(rename = "updateInterval")]
    pub update_interval_ms: u64,

    /// Abort the federation when a vehicle insertion fails.  When `false`
    /// the vehicle is dropped with a warning and the simulation continues.
    pub exit_on_insertion_error: bool,

    /// Subscribe to every vehicle entering the simulation.  When `false`
    /// only vehicles carrying application logic are subscribed.
    pub subscribe_to_all_vehicles: bool,

    /// Window over which induction-loop passes are aggregated into a
    /// traffic flow (veh/h).  In seconds.
    #[serde(rename = "flowMeasurementWindow")]
    pub flow_measurement_window_s: u64,

    /// Offset added to every time-gap parametrization handed to the
    /// simulator (vehicle-type declaration and later parameter changes).
    pub time_gap_offset: f64,

    /// Vehicle actions highlighted in the simulator GUI.
    pub highlights: Vec<Highlight>,

    /// Extra parameters appended to the simulator start command.
    pub extra_startup_parameters: Vec<String>,

    /// Mode used when mirroring externally-owned vehicles to an explicit
    /// position each step.
    pub position_sync_mode: PositionSyncMode,

    /// Connection handshake attempts before giving up.
    pub connection_attempts: u32,

    /// Delay between handshake attempts, in milliseconds.
    #[serde(rename = "connectionRetryDelay")]
    pub connection_retry_delay_ms: u64,
}

impl Default for FederateConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 1_000,
            exit_on_insertion_error: false,
            subscribe_to_all_vehicles: true,
            flow_measurement_window_s: 300,
            time_gap_offset: 0.0,
            highlights: Vec::new(),
            extra_startup_parameters: Vec::new(),
            position_sync_mode: PositionSyncMode::SwitchRoute,
            connection_attempts: 5,
            connection_retry_delay_ms: 1_000,
        }
    }
}

impl FederateConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn load(path: &Path) -> CoreResult<FederateConfig> {
        let raw = std::fs::read_to_string(path)?;
        let config: FederateConfig =
            serde_json::from_str(&raw).map_err(|e| CoreError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints not expressible in serde defaults.
    pub fn validate(&self) -> CoreResult<()> {
        if self.update_interval_ms < 100 {
            return Err(CoreError::Config(format!(
                "updateInterval must be at least 100 ms, got {}",
                self.update_interval_ms
            )));
        }
        if self.connection_attempts == 0 {
            return Err(CoreError::Config(
                "connectionAttempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn update_interval(&self) -> SimTime {
        SimTime::from_millis(self.update_interval_ms)
    }

    #[inline]
    pub fn highlight_enabled(&self, highlight: Highlight) -> bool {
        self.highlights.contains(&highlight)
    }
}
