//! Error types for the simulator.

use settlement_engine::{InvariantViolation, SettlementError};
use thiserror::Error;

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, BankError>;

#[derive(Error, Debug)]
pub enum BankError {
    /// Invalid workload or run configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// End-of-run check failed.
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
