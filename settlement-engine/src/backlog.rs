//! The manager's backlog of transactions not yet dispatched.
//!
//! Entries live in an arena and are flagged rather than removed while a scan is
//! running, so indices stay stable for the whole pass. Flagged entries are
//! compacted out once the pass is over, keeping the survivors in arrival order.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::types::{AccountId, Dispatch, Seq, Transaction};

/// A transaction whose accounts have been resolved against the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    pub seq: Seq,
    pub transaction: Transaction,
}

impl PendingTransaction {
    pub fn from(&self) -> AccountId {
        self.transaction.from
    }

    pub fn to(&self) -> AccountId {
        self.transaction.to
    }

    pub fn dispatch(&self) -> Dispatch {
        Dispatch {
            seq: self.seq,
            transaction: self.transaction,
        }
    }
}

#[derive(Debug)]
struct Slot {
    pending: PendingTransaction,
    dispatched: bool,
}

/// Index-stable arena of pending transactions, owned by the manager.
#[derive(Debug, Default)]
pub struct Backlog {
    slots: Vec<Slot>,
    live: usize,
    next_seq: Seq,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction after checking both accounts exist.
    pub fn push(&mut self, transaction: Transaction, ledger: &Ledger) -> Result<Seq> {
        ledger.account(transaction.from)?;
        ledger.account(transaction.to)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.push(Slot {
            pending: PendingTransaction { seq, transaction },
            dispatched: false,
        });
        self.live += 1;
        Ok(seq)
    }

    /// Number of entries not yet dispatched.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total number of transactions ever pushed.
    pub fn submitted(&self) -> usize {
        self.next_seq as usize
    }

    /// Live entries in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingTransaction> {
        self.slots
            .iter()
            .filter(|slot| !slot.dispatched)
            .map(|slot| &slot.pending)
    }

    /// Visits every live entry from the newest to the oldest.
    ///
    /// Entries for which `visit` returns `Ok(true)` are marked dispatched and
    /// never visited again. The walk direction is the tie-break between
    /// conflicting entries: the later arrival wins a contested account. Returns
    /// the number of entries dispatched during this pass.
    pub fn scan_reverse<F, E>(&mut self, mut visit: F) -> std::result::Result<usize, E>
    where
        F: FnMut(&PendingTransaction) -> std::result::Result<bool, E>,
    {
        let mut dispatched = 0;
        let mut outcome = Ok(());

        for slot in self.slots.iter_mut().rev() {
            if slot.dispatched {
                continue;
            }
            match visit(&slot.pending) {
                Ok(true) => {
                    slot.dispatched = true;
                    dispatched += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.live -= dispatched;
        self.compact();
        outcome.map(|_| dispatched)
    }

    fn compact(&mut self) {
        self.slots.retain(|slot| !slot.dispatched);
    }
}
