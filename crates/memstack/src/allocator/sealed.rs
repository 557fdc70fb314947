//! Sealed trait pattern for the allocator's compile-time contracts
//!
//! [`StackPolicy`](crate::allocator::stack::StackPolicy) is only implementable
//! within `memstack`. External crates can name it as a bound and pick any of
//! the `Policy<...>` flag combinations, but cannot add policies of their own:
//! the allocator's `unsafe` code relies on the header and lock types that the
//! flags select.
//!
//! # Example
//!
//! ```rust
//! use memstack::allocator::stack::{StackAllocator, StackPolicy};
//!
//! // Can use as bound
//! fn report<P: StackPolicy>(allocator: &StackAllocator<'_, P>) -> bool {
//!     P::STACK_CHECK && allocator.used_size() == 0
//! }
//!
//! // Cannot implement externally
//! // impl StackPolicy for MyPolicy { }  // ERROR: Sealed not accessible
//! ```

// ============================================================================
// Sealing Mechanism
// ============================================================================

mod private {
    /// Private sealing trait - cannot be named or implemented outside this crate
    pub trait Sealed {}

    impl<
        const SIZE: bool,
        const BOUNDS: bool,
        const STACK: bool,
        const NULL: bool,
        const OWNERSHIP: bool,
        const THREAD: bool,
    > Sealed for crate::allocator::stack::Policy<SIZE, BOUNDS, STACK, NULL, OWNERSHIP, THREAD>
    {
    }
}

pub(crate) use private::Sealed;
