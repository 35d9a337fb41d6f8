//! Base error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant where they touch configuration or parsing.

use thiserror::Error;

/// Errors produced by configuration loading and low-level decoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `fed-core`.
pub type CoreResult<T> = Result<T, CoreError>;
