//! Concurrent funds-transfer settlement.
//!
//! A single manager thread accepts a finite stream of account-to-account
//! transfers and dispatches them to a fixed pool of executor threads, such that
//! no two transfers settling at the same time touch a common account. The sum of
//! all balances is therefore invariant however the executors interleave.
//!
//! # Core Components
//!
//! - **Ledger**: accounts with compare-and-swap lock flags, plus the transfer total
//! - **Manager**: scans the backlog newest-first, locking and dispatching every
//!   transaction whose accounts are both free
//! - **AdmissionSemaphore**: a one-permit completion credit that paces manager rescans
//! - **Executor pool**: settles, unlocks, returns the credit and reports completion
//! - **ConcurrencyWatermark**: records peak parallelism for reporting
//!
//! # Protocol
//!
//! 1. The manager takes one admission permit
//! 2. It walks the backlog from the newest entry to the oldest
//! 3. An entry whose accounts are both unlocked gets `from` then `to` locked and is dispatched
//! 4. An executor settles it, unlocks both accounts, then releases a permit
//! 5. Repeat until the backlog is empty, then close the dispatch channel
//!
//! Contended transactions may wait for many passes; the walk order is a
//! tie-break, not a fairness guarantee.
//!
//! # Example
//!
//! ```
//! use settlement_engine::{Ledger, SettlementConfig, SettlementEngine, Transaction};
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(Ledger::new([("A", 1000), ("B", 1000)]));
//! let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(2));
//!
//! let stats = engine
//!     .run([Transaction::new(0, 1, 100), Transaction::new(1, 0, 50)])
//!     .unwrap();
//!
//! assert_eq!(stats.completed(), 2);
//! assert_eq!(ledger.sum(), 2000);
//! ```

pub mod audit;
pub mod backlog;
pub mod engine;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod manager;
pub mod probe;
pub mod queue;
pub mod semaphore;
pub mod types;
pub mod watermark;

pub use audit::RunAudit;
pub use engine::{RunStats, SettlementConfig, SettlementEngine, SettlementHandle};
pub use error::{InvariantViolation, Result, SettlementError};
pub use executor::ExecutorStats;
pub use ledger::{Account, AccountSnapshot, Ledger, LedgerSnapshot};
pub use manager::ManagerStats;
pub use probe::{NoopProbe, SettlementProbe};
pub use queue::TransactionQueue;
pub use semaphore::AdmissionSemaphore;
pub use types::{AccountId, Completion, Dispatch, ExecutorId, Seq, Transaction};
pub use watermark::ConcurrencyWatermark;
