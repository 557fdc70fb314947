//! Per-allocator statistics counters
//!
//! Counters are updated with `Relaxed` atomics and only when
//! [`StackConfig::track_stats`](crate::allocator::stack::StackConfig) is set.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of an allocator's statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStats {
    /// Bytes between the arena start and the current offset
    pub used_bytes: usize,
    /// Arena capacity
    pub total_bytes: usize,
    /// Highest offset reached since construction or `clear_statistics`
    pub peak_used_bytes: usize,
    /// Successful allocations
    pub allocation_count: u64,
    /// Deallocations of single allocations; rewinds and resets are not counted
    pub deallocation_count: u64,
    /// Calls to `reset`
    pub reset_count: u64,
}

impl StackStats {
    /// Fraction of the arena in use (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        if self.total_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.total_bytes as f64
        }
    }

    /// Allocations not yet matched by a deallocation
    pub fn live_allocations(&self) -> u64 {
        self.allocation_count.saturating_sub(self.deallocation_count)
    }
}

/// Atomic counters backing [`StackStats`]
#[derive(Debug, Default)]
pub struct StackCounters {
    allocations: AtomicU64,
    deallocations: AtomicU64,
    resets: AtomicU64,
    peak_used: AtomicUsize,
}

impl StackCounters {
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            deallocations: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            peak_used: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn record_allocation(&self, used: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        atomic_max(&self.peak_used, used);
    }

    #[inline]
    pub fn record_deallocation(&self) {
        self.deallocations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Builds a snapshot for an allocator at `used` of `total` bytes
    pub fn snapshot(&self, used: usize, total: usize) -> StackStats {
        StackStats {
            used_bytes: used,
            total_bytes: total,
            peak_used_bytes: self.peak_used.load(Ordering::Relaxed).max(used),
            allocation_count: self.allocations.load(Ordering::Relaxed),
            deallocation_count: self.deallocations.load(Ordering::Relaxed),
            reset_count: self.resets.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter
    pub fn clear(&self) {
        self.allocations.store(0, Ordering::Relaxed);
        self.deallocations.store(0, Ordering::Relaxed);
        self.resets.store(0, Ordering::Relaxed);
        self.peak_used.store(0, Ordering::Relaxed);
    }
}

/// Raises `current` to `value` if it is larger
#[inline]
pub fn atomic_max(current: &AtomicUsize, value: usize) {
    current.fetch_max(value, Ordering::Relaxed);
}
