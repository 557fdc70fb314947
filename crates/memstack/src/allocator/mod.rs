//! Allocators provided by memstack
//!
//! Only the [`stack`] allocator lives here today. Its policy trait is sealed
//! through [`sealed`].

pub(crate) mod sealed;
pub mod stack;

pub use stack::{
    DefaultPolicy, Policy, StackAllocator, StackConfig, StackPolicy, ThreadSafePolicy,
    ThreadSafeStackAllocator, UncheckedPolicy, UncheckedStackAllocator,
};
