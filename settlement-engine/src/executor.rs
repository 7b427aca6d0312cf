//! Executor pool: workers that settle dispatched transactions.

use crate::error::{Result, SettlementError};
use crate::ledger::{EntryId, Ledger};
use crate::probe::SettlementProbe;
use crate::semaphore::AdmissionSemaphore;
use crate::types::{Completion, Dispatch, ExecutorId};
use crate::watermark::ConcurrencyWatermark;
use crossbeam::channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Per-worker counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub executor: ExecutorId,
    /// Transactions settled and reported to the caller.
    pub settled: usize,
    /// Transactions that hit a protocol error.
    pub errors: usize,
}

/// Shared state every worker needs.
#[derive(Clone)]
pub(crate) struct PoolContext {
    pub ledger: Arc<Ledger>,
    pub admission: Arc<AdmissionSemaphore>,
    pub watermark: Arc<ConcurrencyWatermark>,
    pub probe: Arc<dyn SettlementProbe>,
}

struct Worker {
    id: ExecutorId,
    ctx: PoolContext,
    completions: Sender<Completion>,
}

impl Worker {
    fn run(self, dispatches: Receiver<Dispatch>) -> ExecutorStats {
        let mut stats = ExecutorStats {
            executor: self.id,
            ..Default::default()
        };

        for dispatch in dispatches.iter() {
            match self.settle(&dispatch) {
                Ok(()) => stats.settled += 1,
                Err(e) => {
                    error!(executor = self.id, seq = dispatch.seq, "Settlement failed: {e}");
                    stats.errors += 1;
                }
            }
        }

        debug!(executor = self.id, settled = stats.settled, "Executor done");
        stats
    }

    /// Settles one transaction handed over by the manager.
    fn settle(&self, dispatch: &Dispatch) -> Result<()> {
        let _active = self.ctx.watermark.track();
        let ledger = &self.ctx.ledger;
        let tx = &dispatch.transaction;

        let claim = Claim {
            worker: self,
            dispatch,
            entry: ledger.add_in_progress(*tx, self.id),
            armed: true,
        };

        let from = ledger.account_name(tx.from)?;
        let to = ledger.account_name(tx.to)?;
        debug!(
            executor = self.id,
            seq = dispatch.seq,
            "Processing transaction from {from} to {to}"
        );

        self.ctx.probe.on_settle_start(self.id, dispatch);
        let executed = ledger.execute(tx, self.id);
        self.ctx.probe.on_settle_end(self.id, dispatch);

        let unlocked = claim.finish();

        executed?;
        unlocked?;

        if self
            .completions
            .send(Completion {
                seq: dispatch.seq,
                transaction: *tx,
                executor: self.id,
            })
            .is_err()
        {
            debug!(executor = self.id, "Completion receiver dropped");
        }
        Ok(())
    }

    fn unlock(&self, dispatch: &Dispatch) -> Result<()> {
        let tx = &dispatch.transaction;
        let holder = dispatch.holder();

        let from = self.ctx.ledger.unlock_account(tx.from, &holder);
        let to = if tx.is_self_transfer() {
            Ok(())
        } else {
            self.ctx.ledger.unlock_account(tx.to, &holder)
        };
        from.and(to)
    }
}

/// Locks and admission permit held for one dispatch.
///
/// `finish` hands them back in order. If the worker unwinds first, `Drop`
/// does the same so the manager is not left waiting on a dead executor.
struct Claim<'a> {
    worker: &'a Worker,
    dispatch: &'a Dispatch,
    entry: EntryId,
    armed: bool,
}

impl Claim<'_> {
    fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.hand_back()
    }

    fn hand_back(&self) -> Result<()> {
        let unlocked = self.worker.unlock(self.dispatch);
        // Only after both unlocks, so the manager's next pass sees them released.
        self.worker.ctx.admission.release();
        self.worker
            .ctx
            .ledger
            .remove_completed(self.entry, self.worker.id);
        unlocked
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                executor = self.worker.id,
                seq = self.dispatch.seq,
                "Executor unwound mid-settlement, releasing its accounts"
            );
            let _ = self.hand_back();
        }
    }
}

/// Spawns `size` executor threads draining `dispatches`.
pub(crate) fn spawn_pool(
    size: usize,
    ctx: PoolContext,
    dispatches: Receiver<Dispatch>,
    completions: Sender<Completion>,
) -> Result<Vec<JoinHandle<ExecutorStats>>> {
    (0..size)
        .map(|id| {
            let worker = Worker {
                id,
                ctx: ctx.clone(),
                completions: completions.clone(),
            };
            let dispatches = dispatches.clone();
            thread::Builder::new()
                .name(format!("executor-{id}"))
                .spawn(move || worker.run(dispatches))
                .map_err(|e| SettlementError::Spawn {
                    role: "executor",
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Waits for every worker and collects their counters.
pub(crate) fn join_pool(handles: Vec<JoinHandle<ExecutorStats>>) -> Result<Vec<ExecutorStats>> {
    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .map_err(|_| SettlementError::ThreadPanicked("executor"))
        })
        .collect()
}
