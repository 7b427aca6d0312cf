//! Sequential settlement executor.
//!
//! This module provides a baseline executor that settles transfers one at a
//! time, in order, on the calling thread.

use super::{ExecutionResult, Executor};
use crate::{Result, Workload};
use settlement_engine::{Ledger, Transaction};
use std::sync::Arc;
use tracing::warn;

/// Sequential executor that settles transfers one at a time.
///
/// Each transfer still takes the account locks the concurrent engine would
/// take, so both strategies exercise the same ledger protocol.
///
/// # Example
///
/// ```
/// use bank_settlement::{Executor, SequentialExecutor, Workload, WorkloadConfig};
/// use std::sync::Arc;
///
/// let workload = Workload::generate(WorkloadConfig::default()).unwrap();
/// let ledger = Arc::new(workload.create_ledger());
///
/// let result = SequentialExecutor::new().execute(ledger, &workload).unwrap();
/// assert_eq!(result.successful, workload.transactions.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SequentialExecutor;

impl SequentialExecutor {
    pub fn new() -> Self {
        Self
    }

    fn settle(ledger: &Ledger, seq: usize, tx: &Transaction) -> settlement_engine::Result<()> {
        let holder = format!("txn-{seq}");

        ledger.lock_account(tx.from, &holder)?;
        if !tx.is_self_transfer() {
            if let Err(e) = ledger.lock_account(tx.to, &holder) {
                ledger.unlock_account(tx.from, &holder)?;
                return Err(e);
            }
        }

        let executed = ledger.execute(tx, 0);

        ledger.unlock_account(tx.from, &holder)?;
        if !tx.is_self_transfer() {
            ledger.unlock_account(tx.to, &holder)?;
        }
        executed
    }
}

impl Executor for SequentialExecutor {
    fn execute(&self, ledger: Arc<Ledger>, workload: &Workload) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::default();

        for (seq, tx) in workload.transactions.iter().enumerate() {
            match Self::settle(&ledger, seq, tx) {
                Ok(()) => result.successful += 1,
                Err(e) => {
                    warn!(seq, "Sequential settlement failed: {e}");
                    result.failed += 1;
                }
            }
        }

        result.peak_concurrency = usize::from(result.successful > 0);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}
