//! Core types shared by the manager, the executor pool and callers.

use std::fmt;

/// Dense account identifier (index into the ledger roster).
pub type AccountId = usize;

/// Executor identifier within the pool (0-based).
pub type ExecutorId = usize;

/// Submission sequence number assigned by the manager on intake.
pub type Seq = u64;

/// A transfer of `amount` from one account to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transaction {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: i64,
}

impl Transaction {
    pub fn new(from: AccountId, to: AccountId, amount: i64) -> Self {
        Self { from, to, amount }
    }

    /// Returns true if both sides name the same account.
    pub fn is_self_transfer(&self) -> bool {
        self.from == self.to
    }

    /// Accounts touched by this transaction, deduplicated.
    pub fn accounts(&self) -> impl Iterator<Item = AccountId> {
        let to = (!self.is_self_transfer()).then_some(self.to);
        std::iter::once(self.from).chain(to)
    }

    /// Returns true if the two transactions share any account.
    pub fn conflicts_with(&self, other: &Transaction) -> bool {
        self.accounts().any(|a| other.accounts().any(|b| a == b))
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.from, self.to, self.amount)
    }
}

/// A locked transaction handed from the manager to the executor pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub seq: Seq,
    pub transaction: Transaction,
}

impl Dispatch {
    /// Lock owner name recorded on both accounts while this dispatch is in flight.
    pub fn holder(&self) -> String {
        format!("txn-{}", self.seq)
    }
}

/// Signal emitted to the caller once a transaction has been settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub seq: Seq,
    pub transaction: Transaction,
    pub executor: ExecutorId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_transfer_touches_one_account() {
        let tx = Transaction::new(3, 3, 10);
        assert!(tx.is_self_transfer());
        assert_eq!(tx.accounts().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_conflicts() {
        let a = Transaction::new(0, 1, 10);
        assert!(a.conflicts_with(&Transaction::new(1, 2, 5)));
        assert!(a.conflicts_with(&Transaction::new(2, 0, 5)));
        assert!(!a.conflicts_with(&Transaction::new(2, 3, 5)));
        assert!(a.conflicts_with(&Transaction::new(1, 1, 5)));
    }

    #[test]
    fn test_holder_name() {
        let dispatch = Dispatch {
            seq: 7,
            transaction: Transaction::new(0, 1, 1),
        };
        assert_eq!(dispatch.holder(), "txn-7");
    }
}
