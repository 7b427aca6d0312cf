//! Single coordinator that locks and dispatches transactions.

use crate::backlog::{Backlog, PendingTransaction};
use crate::error::{Result, SettlementError};
use crate::ledger::Ledger;
use crate::probe::SettlementProbe;
use crate::semaphore::AdmissionSemaphore;
use crate::types::{Dispatch, Transaction};
use crossbeam::channel::{Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters reported by the manager once the backlog is drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Transactions taken from the queue.
    pub submitted: usize,
    /// Transactions handed to the executor pool.
    pub dispatched: usize,
    /// Backlog passes run.
    pub scans: usize,
    /// Passes that dispatched nothing.
    pub idle_scans: usize,
}

/// The manager.
///
/// It is the only writer moving account locks from unlocked to locked. Each pass
/// over the backlog is admitted by one permit from the semaphore, which
/// executors replenish after unlocking, so a rescan only happens once some
/// settlement has finished.
pub(crate) struct Manager {
    ledger: Arc<Ledger>,
    admission: Arc<AdmissionSemaphore>,
    dispatch: Sender<Dispatch>,
    probe: Arc<dyn SettlementProbe>,
}

impl Manager {
    pub fn new(
        ledger: Arc<Ledger>,
        admission: Arc<AdmissionSemaphore>,
        dispatch: Sender<Dispatch>,
        probe: Arc<dyn SettlementProbe>,
    ) -> Self {
        Self {
            ledger,
            admission,
            dispatch,
            probe,
        }
    }

    /// Drains the transaction queue until it is closed.
    pub fn intake(queue: &Receiver<Transaction>, ledger: &Ledger) -> Result<Backlog> {
        let mut backlog = Backlog::new();
        for transaction in queue.iter() {
            backlog.push(transaction, ledger)?;
        }
        info!(transactions = backlog.len(), "Backlog loaded");
        Ok(backlog)
    }

    /// Dispatches the whole backlog, then closes the dispatch channel.
    pub fn run(self, mut backlog: Backlog) -> Result<ManagerStats> {
        let mut stats = ManagerStats {
            submitted: backlog.submitted(),
            ..Default::default()
        };

        while !backlog.is_empty() {
            self.admission.acquire();
            stats.scans += 1;

            let dispatched = backlog.scan_reverse(|pending| self.try_dispatch(pending))?;
            if dispatched == 0 {
                stats.idle_scans += 1;
            }
            stats.dispatched += dispatched;

            debug!(
                scan = stats.scans,
                dispatched,
                remaining = backlog.len(),
                "Manager pass"
            );
        }

        info!(
            dispatched = stats.dispatched,
            scans = stats.scans,
            idle_scans = stats.idle_scans,
            "Backlog drained, closing dispatch"
        );
        // Dropping `self` closes the dispatch channel.
        Ok(stats)
    }

    /// Locks and dispatches `pending` if neither of its accounts is held.
    fn try_dispatch(&self, pending: &PendingTransaction) -> Result<bool> {
        let from = self.ledger.account(pending.from())?;
        let to = self.ledger.account(pending.to())?;
        if from.is_locked() || to.is_locked() {
            return Ok(false);
        }

        let dispatch = pending.dispatch();
        let holder = dispatch.holder();

        // Always `from` before `to`; a self-transfer takes its single lock once.
        self.ledger.lock_account(pending.from(), &holder)?;
        if !pending.transaction.is_self_transfer() {
            self.ledger.lock_account(pending.to(), &holder)?;
        }

        self.probe.on_dispatch(&dispatch);
        self.dispatch
            .send(dispatch)
            .map_err(|_| SettlementError::DispatchClosed)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::NoopProbe;
    use crossbeam::channel;

    fn manager(ledger: Arc<Ledger>, capacity: usize) -> (Manager, Receiver<Dispatch>) {
        let (tx, rx) = channel::bounded(capacity);
        let manager = Manager::new(
            ledger,
            Arc::new(AdmissionSemaphore::new(1, 1)),
            tx,
            Arc::new(NoopProbe),
        );
        (manager, rx)
    }

    fn backlog(ledger: &Ledger, txs: &[Transaction]) -> Backlog {
        let (tx, rx) = channel::unbounded();
        for t in txs {
            tx.send(*t).unwrap();
        }
        drop(tx);
        Manager::intake(&rx, ledger).unwrap()
    }

    #[test]
    fn test_single_pass_dispatches_disjoint_and_newest_wins() {
        let ledger = Arc::new(Ledger::new([("A", 0), ("B", 0), ("C", 0), ("D", 0)]));
        let (manager, rx) = manager(ledger.clone(), 8);
        let mut backlog = backlog(
            &ledger,
            &[
                Transaction::new(0, 1, 1), // seq 0, conflicts with seq 2
                Transaction::new(2, 3, 1), // seq 1
                Transaction::new(1, 0, 1), // seq 2
            ],
        );

        let dispatched = backlog
            .scan_reverse(|pending| manager.try_dispatch(pending))
            .unwrap();
        assert_eq!(dispatched, 2);

        let seqs: Vec<_> = rx.try_iter().map(|d| d.seq).collect();
        assert_eq!(seqs, vec![2, 1]);
        assert_eq!(backlog.iter().map(|p| p.seq).collect::<Vec<_>>(), vec![0]);

        for id in 0..4 {
            assert!(ledger.is_locked(id).unwrap());
        }
        assert_eq!(ledger.lock_owner(0).unwrap().as_deref(), Some("txn-2"));
        assert_eq!(ledger.lock_owner(3).unwrap().as_deref(), Some("txn-1"));
    }

    #[test]
    fn test_self_transfer_locks_once() {
        let ledger = Arc::new(Ledger::new([("A", 0)]));
        let (manager, rx) = manager(ledger.clone(), 1);
        let mut backlog = backlog(&ledger, &[Transaction::new(0, 0, 5)]);

        let dispatched = backlog
            .scan_reverse(|pending| manager.try_dispatch(pending))
            .unwrap();

        assert_eq!(dispatched, 1);
        assert!(ledger.is_locked(0).unwrap());
        assert_eq!(rx.try_recv().unwrap().transaction, Transaction::new(0, 0, 5));
    }

    #[test]
    fn test_locked_accounts_are_skipped() {
        let ledger = Arc::new(Ledger::new([("A", 0), ("B", 0)]));
        ledger.lock_account(1, "elsewhere").unwrap();
        let (manager, rx) = manager(ledger.clone(), 1);
        let mut backlog = backlog(&ledger, &[Transaction::new(0, 1, 5)]);

        let dispatched = backlog
            .scan_reverse(|pending| manager.try_dispatch(pending))
            .unwrap();

        assert_eq!(dispatched, 0);
        assert!(!ledger.is_locked(0).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_dispatch_is_an_error() {
        let ledger = Arc::new(Ledger::new([("A", 0), ("B", 0)]));
        let (manager, rx) = manager(ledger.clone(), 1);
        drop(rx);
        let backlog = backlog(&ledger, &[Transaction::new(0, 1, 5)]);

        assert_eq!(manager.run(backlog), Err(SettlementError::DispatchClosed));
    }

    #[test]
    fn test_intake_rejects_unknown_account() {
        let ledger = Ledger::new([("A", 0)]);
        let (tx, rx) = channel::unbounded();
        tx.send(Transaction::new(0, 3, 1)).unwrap();
        drop(tx);

        assert_eq!(
            Manager::intake(&rx, &ledger).unwrap_err(),
            SettlementError::UnknownAccount(3)
        );
    }
}
