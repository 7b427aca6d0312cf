//! Settlement engine: wires the queue, the manager and the executor pool.

use crate::error::{Result, SettlementError};
use crate::executor::{join_pool, spawn_pool, ExecutorStats, PoolContext};
use crate::ledger::Ledger;
use crate::manager::{Manager, ManagerStats};
use crate::probe::{NoopProbe, SettlementProbe};
use crate::queue::TransactionQueue;
use crate::semaphore::AdmissionSemaphore;
use crate::types::{Completion, Transaction};
use crate::watermark::ConcurrencyWatermark;
use crossbeam::channel::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

/// Configuration for a settlement run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Number of executor threads.
    pub num_executors: usize,
    /// Capacity of the manager-to-executor channel. Defaults to `num_executors`.
    pub dispatch_capacity: Option<usize>,
}

impl SettlementConfig {
    pub fn with_executors(num_executors: usize) -> Self {
        Self {
            num_executors,
            dispatch_capacity: None,
        }
    }

    pub fn dispatch_capacity(&self) -> usize {
        self.dispatch_capacity.unwrap_or(self.num_executors)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_executors == 0 {
            return Err(SettlementError::Config(
                "at least one executor is required".to_string(),
            ));
        }
        if self.dispatch_capacity() == 0 {
            return Err(SettlementError::Config(
                "dispatch capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self::with_executors(4)
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub manager: ManagerStats,
    pub executors: Vec<ExecutorStats>,
    /// Highest number of settlements observed running at once.
    pub peak_concurrency: usize,
    pub duration: Duration,
}

impl RunStats {
    /// Transactions settled across all executors.
    pub fn completed(&self) -> usize {
        self.executors.iter().map(|e| e.settled).sum()
    }

    /// Protocol errors across all executors.
    pub fn errors(&self) -> usize {
        self.executors.iter().map(|e| e.errors).sum()
    }
}

/// Concurrent settlement engine over a shared ledger.
pub struct SettlementEngine {
    config: SettlementConfig,
    ledger: Arc<Ledger>,
    probe: Arc<dyn SettlementProbe>,
}

impl SettlementEngine {
    pub fn new(ledger: Arc<Ledger>, config: SettlementConfig) -> Self {
        Self {
            config,
            ledger,
            probe: Arc::new(NoopProbe),
        }
    }

    /// Installs an instrumentation probe.
    pub fn with_probe(mut self, probe: Arc<dyn SettlementProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Starts a run fed by `queue`.
    ///
    /// The manager drains the queue until it is closed, then starts the
    /// executor pool and dispatches. Completions stream through the returned
    /// handle as transactions settle.
    pub fn start(&self, queue: Receiver<Transaction>) -> Result<SettlementHandle> {
        self.config.validate()?;

        let started = Instant::now();
        let watermark = Arc::new(ConcurrencyWatermark::new());
        let (completion_tx, completion_rx) = channel::unbounded();

        let ledger = self.ledger.clone();
        let probe = self.probe.clone();
        let config = self.config.clone();
        let pool_watermark = watermark.clone();

        let coordinator = thread::Builder::new()
            .name("manager".to_string())
            .spawn(move || -> Result<(ManagerStats, Vec<ExecutorStats>)> {
                let backlog = Manager::intake(&queue, &ledger)?;

                // Capacity 1, one permit up front so the first pass runs immediately.
                let admission = Arc::new(AdmissionSemaphore::new(1, 1));
                let (dispatch_tx, dispatch_rx) = channel::bounded(config.dispatch_capacity());

                let ctx = PoolContext {
                    ledger: ledger.clone(),
                    admission: admission.clone(),
                    watermark: pool_watermark,
                    probe: probe.clone(),
                };
                let workers = spawn_pool(config.num_executors, ctx, dispatch_rx, completion_tx)?;

                let outcome = Manager::new(ledger, admission, dispatch_tx, probe).run(backlog);
                let executors = join_pool(workers)?;
                Ok((outcome?, executors))
            })
            .map_err(|e| SettlementError::Spawn {
                role: "manager",
                reason: e.to_string(),
            })?;

        info!(executors = self.config.num_executors, "Settlement started");

        Ok(SettlementHandle {
            completions: completion_rx,
            watermark,
            coordinator,
            started,
        })
    }

    /// Settles `transactions` to completion and returns the run's counters.
    pub fn run<I>(&self, transactions: I) -> Result<RunStats>
    where
        I: IntoIterator<Item = Transaction>,
    {
        let queue: TransactionQueue = transactions.into_iter().collect();
        let handle = self.start(queue.close())?;
        let observed = handle.completions().iter().count();
        let stats = handle.join()?;
        info!(
            completions = observed,
            peak = stats.peak_concurrency,
            "Settlement finished"
        );
        Ok(stats)
    }
}

/// Handle to a running settlement.
#[derive(Debug)]
pub struct SettlementHandle {
    completions: Receiver<Completion>,
    watermark: Arc<ConcurrencyWatermark>,
    coordinator: JoinHandle<Result<(ManagerStats, Vec<ExecutorStats>)>>,
    started: Instant,
}

impl SettlementHandle {
    /// One completion per settled transaction, in no particular order.
    ///
    /// The channel disconnects once every executor has exited.
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completions
    }

    pub fn watermark(&self) -> &ConcurrencyWatermark {
        &self.watermark
    }

    /// Waits for the manager and the pool to finish.
    pub fn join(self) -> Result<RunStats> {
        let (manager, executors) = self
            .coordinator
            .join()
            .map_err(|_| SettlementError::ThreadPanicked("manager"))??;

        Ok(RunStats {
            manager,
            executors,
            peak_concurrency: self.watermark.peak(),
            duration: self.started.elapsed(),
        })
    }
}
