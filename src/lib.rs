//! Bank settlement simulator built on the `settlement-engine` crate.
//!
//! This crate generates synthetic transfer workloads, runs them through an
//! execution strategy and reports whether the bank kept its books straight.
//!
//! # Architecture
//!
//! The crate is organized around three main concepts:
//!
//! - **Workload**: a pre-generated account roster and transfer list
//! - **Executor**: a strategy for settling the transfers (sequential, concurrent locking)
//! - **Diagnostics**: DOT snapshots of the bank while transfers are in flight
//!
//! # Quick Start
//!
//! ```
//! use bank_settlement::{Executor, LockingExecutor, Workload, WorkloadConfig};
//! use std::sync::Arc;
//!
//! let config = WorkloadConfig {
//!     num_accounts: 6,
//!     num_transactions: 200,
//!     ..Default::default()
//! };
//!
//! let workload = Workload::generate(config).unwrap();
//! let ledger = Arc::new(workload.create_ledger());
//! let start_sum = ledger.sum();
//!
//! let executor = LockingExecutor::new(6);
//! let result = executor.execute(ledger.clone(), &workload).unwrap();
//!
//! assert_eq!(result.successful, 200);
//! assert_eq!(ledger.sum(), start_sum);
//! ```

pub mod dot;
pub mod error;
pub mod executor;

pub use error::{BankError, Result};
pub use executor::{ExecutionResult, Executor, LockingExecutor, SequentialExecutor};

use rand::{rngs::StdRng, Rng, SeedableRng};
use settlement_engine::{Ledger, Transaction};

// ============================================================================
// Account Roster
// ============================================================================

/// An account in the starting roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: String,
    pub balance: i64,
}

/// Spreadsheet-style column name for an account index: `A`..`Z`, `AA`, `AB`, ...
pub fn account_name(index: usize) -> String {
    let mut name = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

// ============================================================================
// Workload Configuration & Generation
// ============================================================================

/// Configuration for workload generation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Number of accounts in the bank. Even sizes give a symmetric DOT layout.
    pub num_accounts: usize,
    /// Number of transfers to generate.
    pub num_transactions: usize,
    /// Opening balance of every account.
    pub initial_balance: i64,
    /// Amounts are drawn uniformly from `1..=max_amount`.
    pub max_amount: i64,
    /// Conflict factor: 0.0 = accounts drawn uniformly, 1.0 = all transfers hit two accounts.
    pub conflict_factor: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_accounts: 6,
            num_transactions: 1000,
            initial_balance: 1000,
            max_amount: 100,
            conflict_factor: 0.0,
            seed: 42,
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_accounts == 0 {
            return Err(BankError::Config("at least one account is required".into()));
        }
        if self.max_amount < 1 {
            return Err(BankError::Config(format!(
                "max amount must be positive, got {}",
                self.max_amount
            )));
        }
        if !(0.0..=1.0).contains(&self.conflict_factor) {
            return Err(BankError::Config(format!(
                "conflict factor must be within 0..=1, got {}",
                self.conflict_factor
            )));
        }
        if self.money_bound().is_none() {
            return Err(BankError::Config(format!(
                "{} accounts of {} plus {} transfers of up to {} overflow a 64-bit balance",
                self.num_accounts, self.initial_balance, self.num_transactions, self.max_amount
            )));
        }
        Ok(())
    }

    /// Largest magnitude any balance, partial sum or transferred total can reach.
    fn money_bound(&self) -> Option<i64> {
        let holdings = i64::try_from(self.num_accounts)
            .ok()?
            .checked_mul(self.initial_balance.checked_abs()?)?;
        let flow = i64::try_from(self.num_transactions)
            .ok()?
            .checked_mul(self.max_amount)?;
        holdings.checked_add(flow)
    }

    /// Size of the account range drawn from when a transfer is "hot".
    fn hot_account_count(&self) -> usize {
        if self.conflict_factor > 0.0 {
            let hot = 2.0 + (1.0 - self.conflict_factor) * (self.num_accounts as f64 - 2.0);
            (hot.max(2.0) as usize).min(self.num_accounts)
        } else {
            self.num_accounts
        }
    }
}

/// A complete run: the starting roster and the transfers to settle.
#[derive(Debug, Clone)]
pub struct Workload {
    pub accounts: Vec<AccountSpec>,
    pub transactions: Vec<Transaction>,
    pub config: WorkloadConfig,
}

impl Workload {
    /// Generates a workload from the given configuration.
    ///
    /// Source and destination are drawn independently, so self-transfers
    /// occur naturally.
    pub fn generate(config: WorkloadConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let accounts = (0..config.num_accounts)
            .map(|i| AccountSpec {
                name: account_name(i),
                balance: config.initial_balance,
            })
            .collect();

        let hot_account_count = config.hot_account_count();

        let transactions = (0..config.num_transactions)
            .map(|_| {
                let use_hot = rng.gen::<f64>() < config.conflict_factor;
                let range = if use_hot {
                    hot_account_count
                } else {
                    config.num_accounts
                };

                Transaction::new(
                    rng.gen_range(0..range),
                    rng.gen_range(0..range),
                    rng.gen_range(1..=config.max_amount),
                )
            })
            .collect();

        Ok(Self {
            accounts,
            transactions,
            config,
        })
    }

    /// Creates a fresh ledger funded with the starting roster.
    pub fn create_ledger(&self) -> Ledger {
        Ledger::new(
            self.accounts
                .iter()
                .map(|account| (account.name.clone(), account.balance)),
        )
    }

    /// Sum of every transfer amount.
    pub fn expected_transferred(&self) -> i64 {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }

    /// Aggregate opening balance.
    pub fn starting_sum(&self) -> i64 {
        self.accounts.iter().map(|account| account.balance).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
