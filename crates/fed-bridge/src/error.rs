//! Bridge error type.

use thiserror::Error;

/// Errors raised while talking to the external simulator.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("connection to simulator failed: {0}")]
    Connection(String),

    #[error("simulator unreachable after {attempts} handshake attempts")]
    Handshake { attempts: u32 },

    #[error("command {command} failed: {reason}")]
    Command { command: &'static str, reason: String },
}

impl BridgeError {
    pub fn command(command: &'static str, reason: impl Into<String>) -> BridgeError {
        BridgeError::Command { command, reason: reason.into() }
    }
}

/// Shorthand result type for all bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
