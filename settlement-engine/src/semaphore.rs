//! Admission semaphore gating the manager's rescan cadence.
//!
//! A permit is a "dispatch-completion credit": executors release one after each
//! settlement, the manager consumes one per scan. Releases saturate at the
//! capacity so a burst of completions collapses into a single rescan, and a
//! releaser never blocks.

use parking_lot::{Condvar, Mutex};

/// Saturating counting semaphore.
#[derive(Debug)]
pub struct AdmissionSemaphore {
    permits: Mutex<usize>,
    available: Condvar,
    capacity: usize,
}

impl AdmissionSemaphore {
    /// Creates a semaphore holding `initial` permits, never more than `capacity`.
    pub fn new(capacity: usize, initial: usize) -> Self {
        Self {
            permits: Mutex::new(initial.min(capacity)),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Blocks until a permit is available, then takes it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Takes a permit if one is available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Returns one permit. Excess permits beyond the capacity are dropped.
    pub fn release(&self) {
        let mut permits = self.permits.lock();
        if *permits < self.capacity {
            *permits += 1;
        }
        drop(permits);
        self.available.notify_one();
    }

    pub fn available(&self) -> usize {
        *self.permits.lock()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_release_saturates() {
        let sema = AdmissionSemaphore::new(1, 1);
        sema.release();
        sema.release();
        assert_eq!(sema.available(), 1);

        assert!(sema.try_acquire());
        assert!(!sema.try_acquire());
    }

    #[test]
    fn test_initial_clamped_to_capacity() {
        let sema = AdmissionSemaphore::new(1, 5);
        assert_eq!(sema.available(), 1);
        assert_eq!(sema.capacity(), 1);
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let sema = Arc::new(AdmissionSemaphore::new(1, 0));

        let waiter = {
            let sema = sema.clone();
            thread::spawn(move || sema.acquire())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        sema.release();
        waiter.join().unwrap();
        assert_eq!(sema.available(), 0);
    }
}
