//! Compile-time safety policies
//!
//! A policy is a type. Each flag is a `const bool` on [`Policy`], and the
//! allocator tests it with `if P::FLAG { ... }`, so a disabled check is
//! removed entirely by monomorphization.
//!
//! | Flag        | Enabled                                   | Violation          |
//! |-------------|-------------------------------------------|--------------------|
//! | `SIZE`      | capacity is verified before committing    | `OutOfMemory`      |
//! | `BOUNDS`    | guards around every payload               | `CorruptionDetected` |
//! | `STACK`     | end offset stored and LIFO order enforced | `OutOfOrderDeallocation` |
//! | `NULL`      | null pointers rejected on deallocation    | `NullPointerDeallocation` |
//! | `OWNERSHIP` | foreign pointers rejected on deallocation | `NotOwnedPointer`  |
//! | `THREAD`    | offset mutation serialized by a mutex     | n/a                |
//!
//! The flags also pick types: `STACK` selects the object header shape and
//! `THREAD` selects the lock. Without `THREAD` the allocator carries no lock
//! and is `!Sync`.

use core::cell::Cell;
use core::marker::PhantomData;

use parking_lot::{Mutex, MutexGuard};

use super::guard::{GuardBack, GuardFront};
use super::header::{CompactHeader, ObjectHeader, StackHeader};
use crate::allocator::sealed::Sealed;

/// Runtime view of a policy's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolicyConfig {
    pub size_check: bool,
    pub bounds_check: bool,
    pub stack_check: bool,
    pub null_check: bool,
    pub ownership_check: bool,
    pub thread_safe: bool,
}

/// Sealed contract implemented by every [`Policy`] flag combination
pub trait StackPolicy: Sealed + Send + Sync + 'static {
    const SIZE_CHECK: bool;
    const BOUNDS_CHECK: bool;
    const STACK_CHECK: bool;
    const NULL_CHECK: bool;
    const OWNERSHIP_CHECK: bool;
    const THREAD_SAFE: bool;

    /// Bytes reserved in front of the header for the front guard
    const FRONT_GUARD_SIZE: usize = if Self::BOUNDS_CHECK { GuardFront::SIZE } else { 0 };

    /// Bytes reserved after the payload for the back guard
    const BACK_GUARD_SIZE: usize = if Self::BOUNDS_CHECK { GuardBack::SIZE } else { 0 };

    /// In-memory header for single objects on the pointer path
    type Header: ObjectHeader;

    /// Lock taken around every offset change
    type Lock: OffsetLock;

    fn config() -> PolicyConfig {
        PolicyConfig {
            size_check: Self::SIZE_CHECK,
            bounds_check: Self::BOUNDS_CHECK,
            stack_check: Self::STACK_CHECK,
            null_check: Self::NULL_CHECK,
            ownership_check: Self::OWNERSHIP_CHECK,
            thread_safe: Self::THREAD_SAFE,
        }
    }
}

/// Policy built from independent flags
///
/// ```rust
/// use memstack::allocator::stack::{Policy, StackAllocator, StackConfig};
///
/// // size and stack checks only
/// type Lean = Policy<true, false, true, false, false, false>;
///
/// let stack = StackAllocator::<Lean>::with_config(256, StackConfig::default()).unwrap();
/// assert!(stack.policy().stack_check);
/// assert!(!stack.policy().bounds_check);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy<
    const SIZE: bool,
    const BOUNDS: bool,
    const STACK: bool,
    const NULL: bool,
    const OWNERSHIP: bool,
    const THREAD: bool,
>;

/// Every check, no lock
pub type DefaultPolicy = Policy<true, true, true, true, true, false>;

/// Every check, offset changes serialized by a mutex
pub type ThreadSafePolicy = Policy<true, true, true, true, true, true>;

/// No checks and no lock; the caller upholds every contract
pub type UncheckedPolicy = Policy<false, false, false, false, false, false>;

impl<
    const SIZE: bool,
    const BOUNDS: bool,
    const STACK: bool,
    const NULL: bool,
    const OWNERSHIP: bool,
    const THREAD: bool,
> StackPolicy for Policy<SIZE, BOUNDS, STACK, NULL, OWNERSHIP, THREAD>
where
    Flag<STACK>: SelectHeader,
    Flag<THREAD>: SelectLock,
{
    const SIZE_CHECK: bool = SIZE;
    const BOUNDS_CHECK: bool = BOUNDS;
    const STACK_CHECK: bool = STACK;
    const NULL_CHECK: bool = NULL;
    const OWNERSHIP_CHECK: bool = OWNERSHIP;
    const THREAD_SAFE: bool = THREAD;

    type Header = <Flag<STACK> as SelectHeader>::Header;
    type Lock = <Flag<THREAD> as SelectLock>::Lock;
}

// ============================================================================
// Type selection
// ============================================================================

#[doc(hidden)]
pub struct Flag<const ENABLED: bool>;

#[doc(hidden)]
pub trait SelectHeader {
    type Header: ObjectHeader;
}

impl SelectHeader for Flag<true> {
    type Header = StackHeader;
}

impl SelectHeader for Flag<false> {
    type Header = CompactHeader;
}

#[doc(hidden)]
pub trait SelectLock {
    type Lock: OffsetLock;
}

impl SelectLock for Flag<true> {
    type Lock = MutexLock;
}

impl SelectLock for Flag<false> {
    type Lock = NoLock;
}

// ============================================================================
// Locks
// ============================================================================

/// Critical section around offset changes
pub trait OffsetLock: Default + Send {
    type Guard<'a>
    where
        Self: 'a;

    /// Enters the critical section until the guard is dropped
    fn acquire(&self) -> Self::Guard<'_>;
}

/// Mutex-backed lock used when `THREAD` is set
#[derive(Debug, Default)]
pub struct MutexLock(Mutex<()>);

impl OffsetLock for MutexLock {
    type Guard<'a> = MutexGuard<'a, ()>;

    #[inline]
    fn acquire(&self) -> Self::Guard<'_> {
        self.0.lock()
    }
}

/// Zero-sized stand-in when `THREAD` is not set
///
/// Not `Sync`, so an allocator holding it cannot be shared between threads.
#[derive(Debug, Default)]
pub struct NoLock(PhantomData<Cell<()>>);

impl OffsetLock for NoLock {
    type Guard<'a> = ();

    #[inline(always)]
    fn acquire(&self) -> Self::Guard<'_> {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(
            DefaultPolicy::config(),
            PolicyConfig {
                size_check: true,
                bounds_check: true,
                stack_check: true,
                null_check: true,
                ownership_check: true,
                thread_safe: false,
            }
        );
        assert!(ThreadSafePolicy::config().thread_safe);
        assert_eq!(
            UncheckedPolicy::config(),
            PolicyConfig {
                size_check: false,
                bounds_check: false,
                stack_check: false,
                null_check: false,
                ownership_check: false,
                thread_safe: false,
            }
        );
    }

    #[test]
    fn test_disabled_checks_carry_no_metadata() {
        assert_eq!(size_of::<NoLock>(), 0);
        assert_eq!(UncheckedPolicy::FRONT_GUARD_SIZE, 0);
        assert_eq!(UncheckedPolicy::BACK_GUARD_SIZE, 0);
        assert_eq!(
            size_of::<<UncheckedPolicy as StackPolicy>::Header>(),
            size_of::<CompactHeader>()
        );
        assert_eq!(
            size_of::<<DefaultPolicy as StackPolicy>::Header>(),
            size_of::<StackHeader>()
        );
        assert_eq!(DefaultPolicy::FRONT_GUARD_SIZE, GuardFront::SIZE);
    }

    #[test]
    fn test_lock_selection() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<<ThreadSafePolicy as StackPolicy>::Lock>();

        let lock = MutexLock::default();
        let guard = lock.acquire();
        assert!(lock.0.try_lock().is_none());
        drop(guard);
        assert!(lock.0.try_lock().is_some());
    }
}
