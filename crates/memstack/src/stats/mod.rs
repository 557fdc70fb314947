//! Usage reporting and allocator statistics
//!
//! - [`reporter`]: the [`UsageReporter`] callback contract and
//!   [`UsageTracker`]
//! - [`counter`]: atomic counters and the [`StackStats`] snapshot

pub mod counter;
pub mod reporter;

pub use counter::{StackCounters, StackStats};
pub use reporter::{UsageReporter, UsageTracker};
