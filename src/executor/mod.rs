//! Transaction execution strategies.
//!
//! This module provides the [`Executor`] trait and implementations for
//! different settlement strategies.

mod locking;
mod sequential;

pub use locking::LockingExecutor;
pub use sequential::SequentialExecutor;

use crate::{Result, Workload};
use settlement_engine::Ledger;
use std::sync::Arc;

/// Result of executing a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Number of transactions settled and reported complete.
    pub successful: usize,
    /// Number of transactions that hit a protocol error.
    pub failed: usize,
    /// Transactions never handed to an executor.
    pub unprocessed: usize,
    /// Highest number of settlements observed running at once.
    pub peak_concurrency: usize,
    /// Backlog passes made by the coordinator, if there is one.
    pub scans: usize,
}

impl ExecutionResult {
    /// Total number of transactions processed.
    pub fn total(&self) -> usize {
        self.successful + self.failed
    }
}

/// Trait for different settlement strategies.
///
/// This allows comparing different approaches to settling transfers, such as
/// a sequential baseline against the concurrent locking engine.
///
/// # Implementing a New Executor
///
/// ```ignore
/// use bank_settlement::executor::{ExecutionResult, Executor};
/// use bank_settlement::{Result, Workload};
/// use settlement_engine::Ledger;
/// use std::sync::Arc;
///
/// pub struct ShardedExecutor {
///     pub shards: usize,
/// }
///
/// impl Executor for ShardedExecutor {
///     fn execute(&self, ledger: Arc<Ledger>, workload: &Workload) -> Result<ExecutionResult> {
///         // Your implementation here
///         todo!()
///     }
///
///     fn preserves_order(&self) -> bool {
///         false
///     }
/// }
/// ```
pub trait Executor {
    /// Settles every transaction of `workload` against `ledger`.
    ///
    /// The ledger must have been created from the same workload so that
    /// account ids line up.
    fn execute(&self, ledger: Arc<Ledger>, workload: &Workload) -> Result<ExecutionResult>;

    /// Returns whether transfers settle in exactly the order they were generated.
    fn preserves_order(&self) -> bool {
        true
    }

    /// Returns a human-readable name for this executor.
    fn name(&self) -> &'static str {
        "unknown"
    }
}
