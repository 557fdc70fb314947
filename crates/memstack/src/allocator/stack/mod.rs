//! Fixed-capacity LIFO stack allocator
//!
//! ## Modules
//! - `allocator` - Main `StackAllocator` implementation with LIFO semantics
//! - `policy` - Compile-time check and threading flags
//! - `config` - Runtime configuration variants (production, debug, performance)
//! - `header` - Per-allocation metadata stored in front of payloads
//! - `guard` - Sentinels that detect writes past an allocation
//! - `handle` - Handles returned by the header-free allocation path
//! - `frame` - RAII helper for automatic stack restoration
//! - `marker` - Position markers for scoped deallocation

pub mod allocator;
pub mod config;
pub mod frame;
pub mod guard;
pub mod handle;
pub mod header;
pub mod marker;
pub mod policy;

pub use allocator::{StackAllocator, ThreadSafeStackAllocator, UncheckedStackAllocator};
pub use config::StackConfig;
pub use frame::StackFrame;
pub use handle::{StackArray, StackBlock, StackBox};
pub use header::{CompactHeader, ObjectHeader, StackArrayHeader, StackHeader};
pub use marker::StackMarker;
pub use policy::{
    DefaultPolicy, MutexLock, NoLock, OffsetLock, Policy, PolicyConfig, StackPolicy,
    ThreadSafePolicy, UncheckedPolicy,
};
