//! Error types for settlement.

use crate::types::AccountId;
use thiserror::Error;

/// Result type for settlement operations.
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Errors raised while running the settlement protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Transaction references an account outside the roster.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// Attempt to lock an account that is already held.
    #[error("account {account} is already locked by {owner}")]
    AlreadyLocked { account: AccountId, owner: String },

    /// Attempt to unlock an account that is not held.
    #[error("account {account} is not locked")]
    NotLocked { account: AccountId },

    /// Every executor exited before the backlog drained.
    #[error("dispatch channel closed before the backlog was drained")]
    DispatchClosed,

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The OS refused to start a thread.
    #[error("failed to spawn {role} thread: {reason}")]
    Spawn { role: &'static str, reason: String },

    /// A manager or executor thread panicked.
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// End-of-run correctness failures. These are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("sum of the account balances does not match the starting sum: expected {expected}, got {actual}")]
    BalanceDrift { expected: i64, actual: i64 },

    #[error("not all transactions have been executed: {completed}/{submitted} completed, {queued} still queued")]
    Unprocessed {
        submitted: usize,
        completed: usize,
        queued: usize,
    },

    #[error("incorrect amount of money was transferred: expected {expected}, got {actual}")]
    TransferMismatch { expected: i64, actual: i64 },
}
