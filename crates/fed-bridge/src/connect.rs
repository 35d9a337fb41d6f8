//! Connection handshake with bounded retry.
//!
//! The simulator process may still be starting when the federate first tries
//! to reach it, so the handshake retries a fixed number of times with a fixed
//! delay before giving up.

use std::time::Duration;

use fed_core::FederateConfig;
use tracing::{info, warn};

use crate::error::{BridgeError, BridgeResult};

/// A factory for one bridge connection attempt.
///
/// Implementations own the transport details (socket address, process
/// handles); `try_connect` performs exactly one handshake attempt.
pub trait Connector {
    type Bridge;

    fn try_connect(&mut self) -> BridgeResult<Self::Bridge>;
}

/// Fixed-bound, fixed-backoff retry schedule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FederateConfig) -> RetryPolicy {
        RetryPolicy {
            attempts: config.connection_attempts,
            delay: Duration::from_millis(config.connection_retry_delay_ms),
        }
    }
}

/// Establish the simulator connection, retrying per `policy`.
///
/// Each failed attempt is logged and followed by `policy.delay` of sleep;
/// once all attempts are exhausted a [`BridgeError::Handshake`] is returned.
pub fn connect_with_retry<C: Connector>(
    connector: &mut C,
    policy: RetryPolicy,
) -> BridgeResult<C::Bridge> {
    for attempt in 1..=policy.attempts {
        match connector.try_connect() {
            Ok(bridge) => {
                info!(attempt, "simulator connection established");
                return Ok(bridge);
            }
            Err(e) => {
                warn!(attempt, max = policy.attempts, error = %e, "handshake attempt failed");
                if attempt < policy.attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(BridgeError::Handshake { attempts: policy.attempts })
}
