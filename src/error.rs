use std::num::ParseIntError;
use thiserror::Error;

/// Errors returned at the crate's API boundaries.
#[derive(Error, Debug)]
pub enum RemuxError {
    /// Upstream read or downstream write failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A bit field could not be read.
    #[error("parser error: {0}")]
    Parser(String),

    /// A packet does not have the expected layout.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Unsupported container name.
    #[error("unknown mux: {0}")]
    UnknownMux(String),

    /// Rejected configuration value or key.
    #[error("config error: {0}")]
    Config(String),

    /// Non-numeric configuration value.
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, RemuxError>;
