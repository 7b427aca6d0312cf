//! Transaction queue feeding the manager.
//!
//! The producer pushes the full, predetermined set of transactions and then
//! closes the queue; the manager drains it until it observes the close.

use crate::types::Transaction;
use crossbeam::channel::{self, Receiver, Sender};

/// Producer half of the transaction queue.
#[derive(Debug)]
pub struct TransactionQueue {
    sender: Sender<Transaction>,
    receiver: Receiver<Transaction>,
}

impl TransactionQueue {
    /// Creates an open, unbounded queue.
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// Enqueues a transaction.
    pub fn push(&self, transaction: Transaction) {
        // The queue holds its own receiver, so the channel cannot be disconnected here.
        let _ = self.sender.send(transaction);
    }

    /// Number of transactions waiting to be drained.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Closes the queue and returns the consumer half.
    ///
    /// The returned receiver yields every pushed transaction in order and
    /// then reports disconnection.
    pub fn close(self) -> Receiver<Transaction> {
        self.receiver
    }
}

impl Default for TransactionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Transaction> for TransactionQueue {
    fn from_iter<T: IntoIterator<Item = Transaction>>(iter: T) -> Self {
        let queue = Self::new();
        for transaction in iter {
            queue.push(transaction);
        }
        queue
    }
}
