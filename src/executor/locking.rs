//! Concurrent lock-scan executor.
//!
//! This module wraps the `settlement-engine` crate, implementing the Executor
//! trait and reporting progress as completions stream back.

use crate::executor::{ExecutionResult, Executor};
use crate::{Result, Workload};
use settlement_engine::{
    Ledger, SettlementConfig, SettlementEngine, SettlementProbe, TransactionQueue,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Executor backed by the manager / executor-pool settlement engine.
///
/// Transfers settle concurrently on disjoint accounts, so completion order is
/// not generation order.
pub struct LockingExecutor {
    pub num_executors: usize,
    pub probe: Option<Arc<dyn SettlementProbe>>,
}

impl LockingExecutor {
    /// Creates an executor with `num_executors` worker threads.
    pub fn new(num_executors: usize) -> Self {
        Self {
            num_executors,
            probe: None,
        }
    }

    /// Installs an instrumentation probe for the next runs.
    pub fn with_probe(mut self, probe: Arc<dyn SettlementProbe>) -> Self {
        self.probe = Some(probe);
        self
    }
}

impl Executor for LockingExecutor {
    fn execute(&self, ledger: Arc<Ledger>, workload: &Workload) -> Result<ExecutionResult> {
        let mut engine =
            SettlementEngine::new(ledger, SettlementConfig::with_executors(self.num_executors));
        if let Some(probe) = &self.probe {
            engine = engine.with_probe(probe.clone());
        }

        let queue: TransactionQueue = workload.transactions.iter().copied().collect();
        let handle = engine.start(queue.close())?;

        let total = workload.transactions.len();
        let step = (total / 10).max(1);
        let mut completed = 0;
        for completion in handle.completions() {
            completed += 1;
            debug!(
                executor = completion.executor,
                seq = completion.seq,
                "Completed transactions {completed}"
            );
            if completed % step == 0 || completed == total {
                info!("Completed {completed}/{total} transactions");
            }
        }

        let stats = handle.join()?;

        Ok(ExecutionResult {
            successful: completed,
            failed: stats.errors(),
            unprocessed: stats.manager.submitted - stats.manager.dispatched,
            peak_concurrency: stats.peak_concurrency,
            scans: stats.manager.scans,
        })
    }

    fn preserves_order(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "locking"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SequentialExecutor;
    use crate::WorkloadConfig;

    #[test]
    fn test_locking_executor() {
        let workload = Workload::generate(WorkloadConfig {
            num_accounts: 6,
            num_transactions: 300,
            conflict_factor: 0.5,
            ..Default::default()
        })
        .unwrap();
        let ledger = Arc::new(workload.create_ledger());

        let result = LockingExecutor::new(6)
            .execute(ledger.clone(), &workload)
            .unwrap();

        assert_eq!(result.successful, 300);
        assert_eq!(result.failed, 0);
        assert_eq!(result.unprocessed, 0);
        assert!(result.scans >= 1);
        assert_eq!(ledger.sum(), workload.starting_sum());
        assert_eq!(ledger.money_transferred(), workload.expected_transferred());
    }

    #[test]
    fn test_strategies_agree_on_final_balances() {
        // Transfers commute, so any settlement order lands on the same balances.
        let workload = Workload::generate(WorkloadConfig {
            num_accounts: 8,
            num_transactions: 400,
            seed: 9,
            ..Default::default()
        })
        .unwrap();

        let sequential = Arc::new(workload.create_ledger());
        SequentialExecutor::new()
            .execute(sequential.clone(), &workload)
            .unwrap();

        let locking = Arc::new(workload.create_ledger());
        LockingExecutor::new(4)
            .execute(locking.clone(), &workload)
            .unwrap();

        assert_eq!(sequential.balances(), locking.balances());
        assert_eq!(sequential.money_transferred(), locking.money_transferred());
    }

    #[test]
    fn test_zero_executors_rejected() {
        let workload = Workload::generate(WorkloadConfig::default()).unwrap();
        let ledger = Arc::new(workload.create_ledger());

        assert!(LockingExecutor::new(0).execute(ledger, &workload).is_err());
    }
}
