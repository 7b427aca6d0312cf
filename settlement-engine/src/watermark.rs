//! Peak-concurrency tracking for post-run reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts active settlements and remembers the highest count observed.
#[derive(Debug, Default)]
pub struct ConcurrencyWatermark {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one more settlement as active and returns the new active count.
    pub fn enter(&self) -> usize {
        let current = self.active.fetch_add(1, Ordering::AcqRel) + 1;

        let mut peak = self.peak.load(Ordering::Acquire);
        while current > peak {
            match self.peak.compare_exchange_weak(
                peak,
                current,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }

        current
    }

    pub fn leave(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    /// Enters and returns a guard that leaves on drop.
    pub fn track(&self) -> WatermarkGuard<'_> {
        let active = self.enter();
        WatermarkGuard {
            watermark: self,
            active,
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

/// Leaves the watermark when dropped.
#[derive(Debug)]
pub struct WatermarkGuard<'a> {
    watermark: &'a ConcurrencyWatermark,
    active: usize,
}

impl WatermarkGuard<'_> {
    /// Active count observed on entry.
    pub fn active_on_entry(&self) -> usize {
        self.active
    }
}

impl Drop for WatermarkGuard<'_> {
    fn drop(&mut self) {
        self.watermark.leave();
    }
}
