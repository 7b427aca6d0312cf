//! End-to-end properties of the settlement protocol under real thread interleavings.

use crossbeam::channel;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use settlement_engine::{
    Dispatch, ExecutorId, Ledger, RunAudit, SettlementConfig, SettlementEngine, SettlementError,
    SettlementProbe, Transaction, TransactionQueue,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn roster(accounts: usize, balance: i64) -> Arc<Ledger> {
    Arc::new(Ledger::new(
        (0..accounts).map(|i| (format!("{}", (b'A' + i as u8) as char), balance)),
    ))
}

fn random_transactions(seed: u64, accounts: usize, count: usize) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            Transaction::new(
                rng.gen_range(0..accounts),
                rng.gen_range(0..accounts),
                rng.gen_range(1..=500),
            )
        })
        .collect()
}

/// Fails the test if two settlements sharing an account are ever in flight together.
#[derive(Default)]
struct ExclusionProbe {
    held: Mutex<HashSet<usize>>,
    violations: Mutex<Vec<(Transaction, usize)>>,
}

impl SettlementProbe for ExclusionProbe {
    fn on_settle_start(&self, _executor: ExecutorId, dispatch: &Dispatch) {
        let mut held = self.held.lock();
        for account in dispatch.transaction.accounts() {
            if !held.insert(account) {
                self.violations.lock().push((dispatch.transaction, account));
            }
        }
    }

    fn on_settle_end(&self, _executor: ExecutorId, dispatch: &Dispatch) {
        let mut held = self.held.lock();
        for account in dispatch.transaction.accounts() {
            held.remove(&account);
        }
    }
}

/// Records when each settlement started and ended.
#[derive(Default)]
struct IntervalProbe {
    open: Mutex<HashMap<u64, Instant>>,
    closed: Mutex<Vec<(Transaction, Instant, Instant)>>,
}

impl SettlementProbe for IntervalProbe {
    fn on_settle_start(&self, _executor: ExecutorId, dispatch: &Dispatch) {
        self.open.lock().insert(dispatch.seq, Instant::now());
    }

    fn on_settle_end(&self, _executor: ExecutorId, dispatch: &Dispatch) {
        let end = Instant::now();
        if let Some(start) = self.open.lock().remove(&dispatch.seq) {
            self.closed.lock().push((dispatch.transaction, start, end));
        }
    }
}

#[test]
fn test_conservation_across_executor_counts() {
    for executors in [1, 2, 4, 8] {
        let ledger = roster(8, 1000);
        let start_sum = ledger.sum();
        let transactions = random_transactions(executors as u64, 8, 500);
        let expected: i64 = transactions.iter().map(|t| t.amount).sum();

        let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(executors));
        let stats = engine.run(transactions).unwrap();

        assert_eq!(ledger.sum(), start_sum, "executors = {executors}");
        assert_eq!(ledger.money_transferred(), expected);
        assert_eq!(stats.completed(), 500);
        assert_eq!(stats.errors(), 0);
        assert!(stats.peak_concurrency <= executors);
    }
}

#[test]
fn test_mutual_exclusion_under_contention() {
    let ledger = roster(4, 1000);
    let probe = Arc::new(ExclusionProbe::default());
    let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(8))
        .with_probe(probe.clone());

    engine.run(random_transactions(7, 4, 2000)).unwrap();

    assert!(probe.violations.lock().is_empty());
    assert!(probe.held.lock().is_empty());
    assert_eq!(ledger.sum(), 4000);
}

#[test]
fn test_every_transaction_completes_exactly_once() {
    let ledger = roster(6, 1000);
    let transactions = random_transactions(11, 6, 300);
    let queue: TransactionQueue = transactions.iter().copied().collect();

    let engine = SettlementEngine::new(ledger, SettlementConfig::with_executors(3));
    let handle = engine.start(queue.close()).unwrap();

    let mut seen: Vec<_> = handle
        .completions()
        .iter()
        .map(|completion| {
            assert_eq!(completion.transaction, transactions[completion.seq as usize]);
            completion.seq
        })
        .collect();
    handle.join().unwrap();

    seen.sort_unstable();
    assert_eq!(seen, (0..300).collect::<Vec<u64>>());
}

#[test]
fn test_self_transfers_complete() {
    let ledger = roster(2, 100);
    let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(2));

    let stats = engine
        .run([
            Transaction::new(0, 0, 30),
            Transaction::new(0, 1, 10),
            Transaction::new(1, 1, 5),
            Transaction::new(0, 0, 1),
        ])
        .unwrap();

    assert_eq!(stats.completed(), 4);
    assert_eq!(ledger.balances(), vec![90, 110]);
    assert_eq!(ledger.money_transferred(), 46);
    assert!(!ledger.is_locked(0).unwrap());
    assert!(!ledger.is_locked(1).unwrap());
}

#[test]
fn test_two_account_scenario_with_audit() {
    let ledger = roster(2, 1000);
    let start_sum = ledger.sum();
    let transactions = [
        Transaction::new(0, 1, 100),
        Transaction::new(1, 0, 50),
        Transaction::new(0, 1, 25),
    ];

    let queue: TransactionQueue = transactions.into_iter().collect();
    let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(2));
    let handle = engine.start(queue.close()).unwrap();
    let completed = handle.completions().iter().count();
    handle.join().unwrap();

    let audit = RunAudit::capture(&ledger, start_sum, 175, 3, completed, 0);
    assert_eq!(audit.verify(), Ok(()));
    assert_eq!(ledger.balances(), vec![925, 1075]);
    assert_eq!(ledger.money_transferred(), 175);
}

#[test]
fn test_six_accounts_thousand_transactions() {
    let ledger = roster(6, 1000);
    let probe = Arc::new(IntervalProbe::default());
    let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(6))
        .with_probe(probe.clone());

    let stats = engine.run(random_transactions(2024, 6, 1000)).unwrap();

    assert_eq!(stats.completed(), 1000);
    assert_eq!(ledger.sum(), 6000);

    let intervals = probe.closed.lock();
    assert_eq!(intervals.len(), 1000);
    for (i, (a, a_start, a_end)) in intervals.iter().enumerate() {
        for (b, b_start, b_end) in intervals.iter().skip(i + 1) {
            if a.conflicts_with(b) {
                let overlap = a_start < b_end && b_start < a_end;
                assert!(!overlap, "{a} and {b} settled concurrently");
            }
        }
    }
}

#[test]
fn test_newest_conflicting_transaction_wins_first_pass() {
    let ledger = roster(2, 0);
    let probe = Arc::new(DispatchOrder::default());
    let engine = SettlementEngine::new(ledger, SettlementConfig::with_executors(1))
        .with_probe(probe.clone());

    engine
        .run([
            Transaction::new(0, 1, 1),
            Transaction::new(0, 1, 2),
            Transaction::new(0, 1, 3),
        ])
        .unwrap();

    // Every pass picks the newest remaining entry.
    assert_eq!(*probe.order.lock(), vec![2, 1, 0]);
}

#[derive(Default)]
struct DispatchOrder {
    order: Mutex<Vec<u64>>,
}

impl SettlementProbe for DispatchOrder {
    fn on_dispatch(&self, dispatch: &Dispatch) {
        self.order.lock().push(dispatch.seq);
    }
}

/// Panics on the first settlement it sees, then behaves.
#[derive(Default)]
struct PanicOnce {
    tripped: AtomicBool,
}

impl SettlementProbe for PanicOnce {
    fn on_settle_start(&self, executor: ExecutorId, _dispatch: &Dispatch) {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("executor {executor} lost its instrumentation");
        }
    }
}

#[test]
fn test_executor_panic_is_reported_without_stalling() {
    let ledger = roster(3, 1000);
    let engine = SettlementEngine::new(ledger.clone(), SettlementConfig::with_executors(2))
        .with_probe(Arc::new(PanicOnce::default()));
    let transactions: Vec<_> = (0..20)
        .map(|i| Transaction::new(i % 2, 2, 1 + i as i64))
        .collect();

    let (done_tx, done_rx) = channel::bounded(1);
    thread::spawn(move || {
        let _ = done_tx.send(engine.run(transactions));
    });

    let outcome = done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("run stalled after an executor panicked");
    assert!(matches!(
        outcome,
        Err(SettlementError::ThreadPanicked("executor"))
    ));

    // The dead executor's accounts were handed back and no money moved for it.
    assert!((0..3).all(|id| !ledger.is_locked(id).unwrap()));
    assert_eq!(ledger.in_progress_count(), 0);
    assert_eq!(ledger.sum(), 3000);
}
