//! Instrumentation hook into the settlement protocol.

use crate::types::{Dispatch, ExecutorId};

/// Observer invoked at the protocol's key points.
///
/// `on_settle_start` and `on_settle_end` run while the executor holds the locks
/// on every account the transaction touches, so two overlapping calls for
/// transactions sharing an account indicate a mutual-exclusion failure.
pub trait SettlementProbe: Send + Sync {
    /// Called by the manager after locking, before handing off to the pool.
    fn on_dispatch(&self, _dispatch: &Dispatch) {}

    /// Called by an executor immediately before the balances are mutated.
    fn on_settle_start(&self, _executor: ExecutorId, _dispatch: &Dispatch) {}

    /// Called by an executor after the balances are mutated, before unlocking.
    fn on_settle_end(&self, _executor: ExecutorId, _dispatch: &Dispatch) {}
}

/// Probe that observes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProbe;

impl SettlementProbe for NoopProbe {}
