//! Usage reporting collaborator
//!
//! An allocator built with a reporter calls it on every offset change, from
//! inside its critical section, so reports from one allocator arrive in the
//! same order as the changes they describe.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Receives the allocator's usage after every offset change
pub trait UsageReporter: Send + Sync {
    /// `used` and `total` are in bytes; `name` is the allocator's debug name
    fn on_usage_changed(&self, name: &str, used: usize, total: usize);
}

impl<F> UsageReporter for F
where
    F: Fn(&str, usize, usize) + Send + Sync,
{
    fn on_usage_changed(&self, name: &str, used: usize, total: usize) {
        self(name, used, total);
    }
}

/// Ready-made reporter that keeps the latest and peak usage
#[derive(Debug, Default)]
pub struct UsageTracker {
    last_used: AtomicUsize,
    peak_used: AtomicUsize,
    total: AtomicUsize,
    reports: AtomicU64,
    last_name: Mutex<Option<String>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Used bytes from the most recent report
    pub fn last_used(&self) -> usize {
        self.last_used.load(Ordering::Acquire)
    }

    /// Highest used bytes ever reported
    pub fn peak_used(&self) -> usize {
        self.peak_used.load(Ordering::Acquire)
    }

    /// Total bytes from the most recent report
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Number of reports received
    pub fn report_count(&self) -> u64 {
        self.reports.load(Ordering::Acquire)
    }

    /// Allocator name from the most recent report
    pub fn last_name(&self) -> Option<String> {
        self.last_name.lock().clone()
    }
}

impl UsageReporter for UsageTracker {
    fn on_usage_changed(&self, name: &str, used: usize, total: usize) {
        self.last_used.store(used, Ordering::Release);
        self.peak_used.fetch_max(used, Ordering::AcqRel);
        self.total.store(total, Ordering::Release);
        self.reports.fetch_add(1, Ordering::AcqRel);

        let mut last_name = self.last_name.lock();
        if last_name.as_deref() != Some(name) {
            *last_name = Some(name.to_string());
        }
    }
}
