//! Federate error type.

use thiserror::Error;

use fed_bridge::BridgeError;
use fed_core::{CoreError, RouteId, SimTime, VehicleId};

/// Errors that abort grant processing.
///
/// Recoverable conditions (failed subscriptions, unknown interaction types,
/// dropped insertions when configured to continue) are logged where they
/// occur and never reach this type.
#[derive(Debug, Error)]
pub enum FederateError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("interaction timestamped {interaction_time} arrived after grant {grant_time}")]
    ProtocolViolation {
        interaction_time: SimTime,
        grant_time: SimTime,
    },

    #[error("could not insert vehicle {vehicle}: {reason}")]
    Insertion { vehicle: VehicleId, reason: String },

    #[error("route {0} is not known")]
    MissingRoute(RouteId),
}

/// Shorthand result type for `fed-federate`.
pub type FederateResult<T> = Result<T, FederateError>;
