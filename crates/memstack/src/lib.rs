//! # memstack
//!
//! Fixed-capacity, stack-discipline memory allocation.
//!
//! All backing memory is reserved once when the allocator is built.
//! Allocating and releasing are O(1) offset moves, and memory must be
//! released in the reverse order it was allocated (LIFO). Which safety checks
//! run is decided at compile time by the allocator's policy type, so a
//! disabled check costs nothing.
//!
//! ## Quick Start
//!
//! ```rust
//! use memstack::prelude::*;
//!
//! let stack = StackAllocator::new(4 * KB)?;
//! unsafe {
//!     let scores = stack.new_array(4, 0u32);
//!     let label = stack.new_object(String::from("level-1"));
//!     assert_eq!(scores.len(), 4);
//!
//!     stack.delete(label);
//!     stack.delete_array(scores);
//! }
//! assert_eq!(stack.used_size(), 0);
//! # Ok::<(), StackError>(())
//! ```
//!
//! ## Policies
//!
//! - [`DefaultPolicy`]: every check, single-threaded
//! - [`ThreadSafePolicy`]: every check, offset changes behind a mutex
//! - [`UncheckedPolicy`]: no checks, no metadata beyond what the layout needs
//! - [`Policy`]: any other combination of flags
//!
//! A violated check is fatal: the allocator logs the error and panics.
//!
//! ## Features
//!
//! - `logging` (default): structured events through `tracing`

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(clippy::all)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![allow(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
// Violations panic; each `unsafe fn` lists them next to its safety contract
#![allow(clippy::missing_panics_doc)]
// Stats ratios only
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::elidable_lifetime_names)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::inline_always)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::return_self_not_must_use)]

pub mod allocator;
pub mod core;
pub mod error;
pub mod stats;
pub mod utils;

pub use crate::allocator::stack::{
    DefaultPolicy, Policy, StackAllocator, StackArray, StackBlock, StackBox, StackConfig,
    StackFrame, StackMarker, StackPolicy, ThreadSafePolicy, ThreadSafeStackAllocator,
    UncheckedPolicy, UncheckedStackAllocator,
};
pub use crate::error::{StackError, StackResult};

// Public API exports
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::allocator::stack::{
        DefaultPolicy, Policy, PolicyConfig, StackAllocator, StackArray, StackBlock, StackBox,
        StackConfig, StackFrame, StackMarker, StackPolicy, ThreadSafePolicy,
        ThreadSafeStackAllocator, UncheckedPolicy, UncheckedStackAllocator,
    };
    pub use crate::core::size::{GB, KB, MB};
    pub use crate::error::{StackError, StackResult};
    pub use crate::stats::{StackStats, UsageReporter, UsageTracker};
}
