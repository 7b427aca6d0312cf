//! End-of-run correctness checks.

use crate::error::InvariantViolation;
use crate::ledger::Ledger;

/// Expected and observed figures for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAudit {
    pub expected_transferred: i64,
    pub actual_transferred: i64,
    pub expected_sum: i64,
    pub actual_sum: i64,
    pub submitted: usize,
    pub completed: usize,
    /// Entries still sitting in the transaction queue.
    pub unprocessed: usize,
}

impl RunAudit {
    /// Reads the observed side from `ledger`. Call only once nothing is in flight.
    pub fn capture(
        ledger: &Ledger,
        expected_sum: i64,
        expected_transferred: i64,
        submitted: usize,
        completed: usize,
        unprocessed: usize,
    ) -> Self {
        Self {
            expected_transferred,
            actual_transferred: ledger.money_transferred(),
            expected_sum,
            actual_sum: ledger.sum(),
            submitted,
            completed,
            unprocessed,
        }
    }

    /// Checks conservation, completeness and transfer accounting, in that order.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        if self.actual_sum != self.expected_sum {
            return Err(InvariantViolation::BalanceDrift {
                expected: self.expected_sum,
                actual: self.actual_sum,
            });
        }
        if self.completed != self.submitted || self.unprocessed > 0 {
            return Err(InvariantViolation::Unprocessed {
                submitted: self.submitted,
                completed: self.completed,
                queued: self.unprocessed,
            });
        }
        if self.actual_transferred != self.expected_transferred {
            return Err(InvariantViolation::TransferMismatch {
                expected: self.expected_transferred,
                actual: self.actual_transferred,
            });
        }
        Ok(())
    }
}
