//! Accounts and the bank ledger.
//!
//! Each account carries a lock flag guarded by compare-and-swap. The manager is
//! the only party that moves a flag from unlocked to locked and executors are the
//! only parties that move it back, so a wrong transition surfaces as an error
//! rather than a silent double-lock. Balances are plain atomic cells: the lock
//! protocol guarantees a single writer per account at any time, and the
//! acquire/release pair on the flag publishes the balance to the next holder.

use crate::error::{Result, SettlementError};
use crate::types::{AccountId, ExecutorId, Transaction};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use tracing::trace;

/// Identifier of an in-progress diagnostic record.
pub type EntryId = u64;

/// A balance holder with a mutual-exclusion flag.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    name: String,
    balance: AtomicI64,
    locked: AtomicBool,
    /// Diagnostic only.
    owner: Mutex<Option<String>>,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, balance: i64) -> Self {
        Self {
            id,
            name: name.into(),
            balance: AtomicI64::new(balance),
            locked: AtomicBool::new(false),
            owner: Mutex::new(None),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> i64 {
        self.balance.load(Ordering::Relaxed)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn lock_owner(&self) -> Option<String> {
        self.owner.lock().clone()
    }

    /// Lock flag and holder, read together.
    pub fn lock_state(&self) -> (bool, Option<String>) {
        let owner = self.owner.lock();
        (self.is_locked(), owner.clone())
    }

    // The flag only changes under the owner mutex, so `lock_state` never sees
    // a locked account without its holder.
    fn try_lock(&self, holder: &str) -> Result<()> {
        let mut owner = self.owner.lock();
        if self
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SettlementError::AlreadyLocked {
                account: self.id,
                owner: owner.clone().unwrap_or_default(),
            });
        }
        *owner = Some(holder.to_string());
        Ok(())
    }

    fn unlock(&self) -> Result<()> {
        let mut owner = self.owner.lock();
        self.locked
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SettlementError::NotLocked { account: self.id })?;
        owner.take();
        Ok(())
    }
}

/// A transaction currently being settled, kept for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InProgress {
    pub transaction: Transaction,
    pub executor: ExecutorId,
}

/// Point-in-time view of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: AccountId,
    pub name: String,
    pub balance: i64,
    pub locked: bool,
    pub owner: Option<String>,
}

/// Point-in-time view of the whole ledger.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub accounts: Vec<AccountSnapshot>,
    /// Sorted by entry id.
    pub in_progress: Vec<(EntryId, InProgress)>,
    pub money_transferred: i64,
}

/// The bank: the account roster, the in-progress record and the transfer total.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: Vec<Account>,
    in_progress: DashMap<EntryId, InProgress>,
    next_entry: AtomicU64,
    money_transferred: AtomicI64,
}

impl Ledger {
    /// Creates a ledger from `(name, opening balance)` pairs. Ids are assigned in order.
    pub fn new<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let accounts = accounts
            .into_iter()
            .enumerate()
            .map(|(id, (name, balance))| Account::new(id, name, balance))
            .collect();

        Self {
            accounts,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts
            .get(id)
            .ok_or(SettlementError::UnknownAccount(id))
    }

    pub fn account_name(&self, id: AccountId) -> Result<&str> {
        self.account(id).map(Account::name)
    }

    pub fn balance(&self, id: AccountId) -> Result<i64> {
        self.account(id).map(Account::balance)
    }

    pub fn is_locked(&self, id: AccountId) -> Result<bool> {
        self.account(id).map(Account::is_locked)
    }

    pub fn lock_owner(&self, id: AccountId) -> Result<Option<String>> {
        self.account(id).map(Account::lock_owner)
    }

    /// Marks the account as held by `holder`.
    ///
    /// The caller is expected to have observed the account unlocked; the
    /// compare-and-swap turns a violation of that expectation into
    /// [`SettlementError::AlreadyLocked`].
    pub fn lock_account(&self, id: AccountId, holder: &str) -> Result<()> {
        self.account(id)?.try_lock(holder)?;
        trace!(account = id, holder, "locked");
        Ok(())
    }

    /// Releases the account. Fails with [`SettlementError::NotLocked`] if it was not held.
    pub fn unlock_account(&self, id: AccountId, holder: &str) -> Result<()> {
        self.account(id)?.unlock()?;
        trace!(account = id, holder, "unlocked");
        Ok(())
    }

    /// Moves `amount` from `tx.from` to `tx.to`.
    ///
    /// No sufficiency check is performed; balances may go negative. The caller
    /// must hold the locks on both accounts.
    pub fn execute(&self, tx: &Transaction, executor: ExecutorId) -> Result<()> {
        let from = self.account(tx.from)?;
        let to = self.account(tx.to)?;

        from.balance.fetch_sub(tx.amount, Ordering::Relaxed);
        to.balance.fetch_add(tx.amount, Ordering::Relaxed);
        self.money_transferred
            .fetch_add(tx.amount, Ordering::AcqRel);

        trace!(executor, from = from.name(), to = to.name(), amount = tx.amount, "settled");
        Ok(())
    }

    /// Aggregate balance across all accounts. Only meaningful with nothing in flight.
    pub fn sum(&self) -> i64 {
        self.accounts.iter().map(Account::balance).sum()
    }

    pub fn balances(&self) -> Vec<i64> {
        self.accounts.iter().map(Account::balance).collect()
    }

    pub fn money_transferred(&self) -> i64 {
        self.money_transferred.load(Ordering::Acquire)
    }

    pub fn add_in_progress(&self, transaction: Transaction, executor: ExecutorId) -> EntryId {
        let entry = self.next_entry.fetch_add(1, Ordering::Relaxed);
        self.in_progress
            .insert(entry, InProgress { transaction, executor });
        entry
    }

    pub fn remove_completed(&self, entry: EntryId, executor: ExecutorId) -> Option<InProgress> {
        let removed = self.in_progress.remove(&entry).map(|(_, record)| record);
        if removed.is_none() {
            trace!(entry, executor, "completed entry was not in progress");
        }
        removed
    }

    pub fn in_progress_count(&self) -> usize {
        self.in_progress.len()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let accounts = self
            .accounts
            .iter()
            .map(|account| {
                let (locked, owner) = account.lock_state();
                AccountSnapshot {
                    id: account.id,
                    name: account.name.clone(),
                    balance: account.balance(),
                    locked,
                    owner,
                }
            })
            .collect();

        let mut in_progress: Vec<_> = self
            .in_progress
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        in_progress.sort_unstable_by_key(|(entry, _)| *entry);

        LedgerSnapshot {
            accounts,
            in_progress,
            money_transferred: self.money_transferred(),
        }
    }
}
