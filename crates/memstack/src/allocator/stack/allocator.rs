//! Main stack allocator implementation
//!
//! # Safety
//!
//! This module implements a fixed-capacity LIFO stack allocator on top of
//! [`Arena`]:
//! - The arena is reserved once in the constructor and never grows
//! - Every allocation advances the arena offset; every deallocation rolls it
//!   back to the allocation's start offset, releasing everything allocated
//!   after it
//! - Which contracts are verified at runtime is chosen by the policy type;
//!   the caller of each `unsafe fn` upholds the ones that are not
//!
//! ## Invariants
//!
//! - `0 <= offset <= total_size`
//! - For a live allocation, `start_offset < end_offset <= offset`, and the
//!   allocation is next to be freed exactly when `end_offset == offset`
//! - Front guard, header, payload and back guard lie inside
//!   `[start_offset, end_offset)`
//!
//! ## Thread Safety
//!
//! - With `THREAD`, every offset change runs under one mutex; user
//!   constructors and destructors always run outside it
//! - Without `THREAD`, the allocator is `!Sync`
//!
//! ## Memory Layout
//! ```text
//! start_offset                                             end_offset
//! | padding | front guard | header | payload ... | back guard |
//!                                  ^
//!                                  returned pointer
//! ```
//! Guards are only present with `BOUNDS`. The header is only written by the
//! pointer-returning functions; handle-returning functions keep the offsets
//! in the handle instead.

use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

#[cfg(feature = "logging")]
use tracing::{debug, error, trace};

use super::guard::{check_guards, write_guards};
use super::handle::{StackArray, StackBlock, StackBox};
use super::header::{ObjectHeader, StackArrayHeader, StackHeader, read_header, write_header};
use super::policy::{DefaultPolicy, OffsetLock, PolicyConfig, StackPolicy, ThreadSafePolicy, UncheckedPolicy};
use super::{StackConfig, StackFrame, StackMarker};
use crate::core::{Arena, Offset};
use crate::error::{StackError, StackResult};
use crate::stats::{StackCounters, StackStats, UsageReporter};
use crate::utils::padding_with_header;

/// Offsets of one committed allocation
#[derive(Debug, Clone, Copy)]
struct Reservation {
    start: Offset,
    payload: Offset,
    end: Offset,
}

/// Fixed-capacity stack allocator
///
/// Memory can only be released in reverse order of allocation. Releasing an
/// allocation also releases everything allocated after it.
///
/// # Memory Layout
/// ```text
/// [start]----[alloc1]----[alloc2]----[alloc3]----[offset]----[free]----[end]
///             <------ allocated ------>         <-- available -->
/// ```
///
/// # Examples
/// ```rust
/// use memstack::allocator::stack::StackAllocator;
///
/// let stack = StackAllocator::new(1024).unwrap();
/// unsafe {
///     let position = stack.new_object([1.0f32, 2.0, 3.0]);
///     let name = stack.new_object(String::from("player"));
///     assert_eq!(position[1], 2.0);
///     assert_eq!(name.as_str(), "player");
///
///     stack.delete(name);
///     stack.delete(position);
/// }
/// assert_eq!(stack.used_size(), 0);
/// ```
pub struct StackAllocator<'r, P: StackPolicy = DefaultPolicy> {
    arena: Arena,
    lock: P::Lock,
    config: StackConfig,
    reporter: Option<&'r dyn UsageReporter>,
    counters: StackCounters,
    _policy: PhantomData<P>,
}

/// Allocator whose offset changes are serialized by a mutex
pub type ThreadSafeStackAllocator<'r> = StackAllocator<'r, ThreadSafePolicy>;

/// Allocator with every check compiled out
pub type UncheckedStackAllocator<'r> = StackAllocator<'r, UncheckedPolicy>;

impl StackAllocator<'_, DefaultPolicy> {
    /// Creates a fully checked allocator with the default configuration
    pub fn new(total_size: usize) -> StackResult<Self> {
        Self::with_config(total_size, StackConfig::default())
    }
}

impl<'r, P: StackPolicy> StackAllocator<'r, P> {
    /// Creates a new stack allocator with custom configuration
    pub fn with_config(total_size: usize, config: StackConfig) -> StackResult<Self> {
        Self::build(total_size, config, None)
    }

    /// Creates an allocator that reports every offset change to `reporter`
    pub fn with_reporter(
        total_size: usize,
        config: StackConfig,
        reporter: &'r dyn UsageReporter,
    ) -> StackResult<Self> {
        Self::build(total_size, config, Some(reporter))
    }

    /// Creates a production-optimized stack allocator
    pub fn production(total_size: usize) -> StackResult<Self> {
        Self::with_config(total_size, StackConfig::production())
    }

    /// Creates a debug-optimized stack allocator
    pub fn debug(total_size: usize) -> StackResult<Self> {
        Self::with_config(total_size, StackConfig::debug())
    }

    /// Creates a performance-optimized stack allocator
    pub fn performance(total_size: usize) -> StackResult<Self> {
        Self::with_config(total_size, StackConfig::performance())
    }

    fn build(
        total_size: usize,
        config: StackConfig,
        reporter: Option<&'r dyn UsageReporter>,
    ) -> StackResult<Self> {
        config.validate()?;
        let arena = Arena::new(total_size)?;

        if let Some(pattern) = config.alloc_pattern {
            // SAFETY: the whole arena is unused
            unsafe { arena.fill(0, total_size, pattern) }
        }

        #[cfg(feature = "logging")]
        debug!(
            allocator = %config.debug_name,
            total_size,
            policy = ?P::config(),
            "stack allocator created"
        );

        Ok(Self {
            arena,
            lock: P::Lock::default(),
            config,
            reporter,
            counters: StackCounters::new(),
            _policy: PhantomData,
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Bytes between the arena start and the current offset
    #[inline]
    pub fn used_size(&self) -> usize {
        self.arena.offset()
    }

    /// Capacity fixed at construction
    #[inline]
    pub fn total_size(&self) -> usize {
        self.arena.capacity()
    }

    /// Bytes left above the current offset
    #[inline]
    pub fn available(&self) -> usize {
        self.total_size() - self.used_size()
    }

    pub fn debug_name(&self) -> &str {
        &self.config.debug_name
    }

    /// Flags of the policy this allocator was compiled with
    pub fn policy(&self) -> PolicyConfig {
        P::config()
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Whether `ptr` lies inside the arena
    pub fn owns(&self, ptr: *const u8) -> bool {
        self.arena.owns(ptr.addr())
    }

    /// Snapshot of the counters; counts stay zero unless `track_stats` is set
    pub fn statistics(&self) -> StackStats {
        self.counters.snapshot(self.used_size(), self.total_size())
    }

    pub fn clear_statistics(&self) {
        self.counters.clear();
    }

    // ========================================================================
    // Pointer path: metadata stored in front of the payload
    // ========================================================================

    /// Allocates `size` bytes aligned to `alignment`
    ///
    /// The policy's object header is stored directly in front of the
    /// returned pointer.
    ///
    /// # Panics
    /// If `alignment` is not a power of two, or, with `SIZE`, if the arena
    /// cannot fit the allocation.
    ///
    /// # Safety
    /// Without `SIZE`, the allocation must fit in the remaining capacity.
    /// The memory must not be used after it is deallocated or rolled back.
    pub unsafe fn allocate(&self, size: usize, alignment: usize) -> NonNull<u8> {
        let _guard = self.lock.acquire();
        let header_size = size_of::<P::Header>();
        // SAFETY: lock held; capacity is checked or guaranteed by the caller
        unsafe {
            let reservation = self.reserve(size, alignment, header_size);
            let header = <P::Header as ObjectHeader>::new(reservation.start, reservation.end);
            write_header(&self.arena, reservation.payload, header);
            self.arena.ptr_at(reservation.payload)
        }
    }

    /// [`allocate`](Self::allocate) with the configured default alignment
    ///
    /// # Safety
    /// Same as [`allocate`](Self::allocate).
    pub unsafe fn allocate_default(&self, size: usize) -> NonNull<u8> {
        // SAFETY: forwarded contract
        unsafe { self.allocate(size, self.config.default_alignment) }
    }

    /// Releases an allocation made with [`allocate`](Self::allocate)
    ///
    /// # Panics
    /// On a null pointer with `NULL`, a foreign pointer with `OWNERSHIP`, an
    /// allocation that is not the most recent one with `STACK`, or damaged
    /// guards with `BOUNDS`.
    ///
    /// # Safety
    /// Every contract whose check is disabled: `ptr` was returned by
    /// `allocate` on this allocator, is still live, and is the most recent
    /// live allocation.
    pub unsafe fn deallocate(&self, ptr: *mut u8) {
        let _guard = self.lock.acquire();
        let header_size = size_of::<P::Header>();
        let payload = self.resolve(ptr, header_size);
        // SAFETY: `ptr` came from `allocate`, so the policy header precedes it
        let (header, header_at) = unsafe { read_header::<P::Header>(&self.arena, payload) };
        // SAFETY: lock held
        unsafe {
            self.check_release(payload, header_at, header.start_offset(), header.end_offset());
        }
        self.roll_back(header.start_offset());
        self.counters_on_release();
    }

    /// Allocates `count * element_size` bytes with an array header in front
    ///
    /// # Safety
    /// Same as [`allocate`](Self::allocate).
    pub unsafe fn allocate_array(
        &self,
        count: usize,
        element_size: usize,
        alignment: usize,
    ) -> NonNull<u8> {
        let size = self.array_size(count, element_size);
        let _guard = self.lock.acquire();
        let header_size = size_of::<StackArrayHeader>();
        // SAFETY: lock held; capacity is checked or guaranteed by the caller
        unsafe {
            let reservation = self.reserve(size, alignment, header_size);
            write_header(
                &self.arena,
                reservation.payload,
                StackArrayHeader::new(reservation.start, count),
            );
            self.arena.ptr_at(reservation.payload)
        }
    }

    /// Releases an array made with [`allocate_array`](Self::allocate_array)
    /// and returns its element count
    ///
    /// # Safety
    /// Same as [`deallocate`](Self::deallocate); `element_size` matches the
    /// allocating call.
    pub unsafe fn deallocate_array(&self, ptr: *mut u8, element_size: usize) -> usize {
        let _guard = self.lock.acquire();
        let header_size = size_of::<StackArrayHeader>();
        let payload = self.resolve(ptr, header_size);
        // SAFETY: `ptr` came from `allocate_array`, so an array header precedes it
        let (header, header_at) = unsafe { self.read_array_header(payload) };
        let end = self.array_end(payload, header.count, element_size);
        // SAFETY: lock held
        unsafe { self.check_release(payload, header_at, header.start_offset, Some(end)) };
        self.roll_back(header.start_offset);
        self.counters_on_release();
        header.count
    }

    /// Moves `value` into a fresh allocation with a header in front
    ///
    /// # Safety
    /// Same as [`allocate`](Self::allocate).
    pub unsafe fn new_raw<T>(&self, value: T) -> NonNull<T> {
        // SAFETY: forwarded contract; the allocation fits a `T`
        unsafe {
            let ptr = self.allocate(size_of::<T>(), align_of::<T>()).cast::<T>();
            ptr.write(value);
            ptr
        }
    }

    /// Drops the value at `ptr` and releases its allocation
    ///
    /// The value is dropped after the offset has been rolled back.
    ///
    /// # Safety
    /// Same as [`deallocate`](Self::deallocate); `ptr` came from
    /// [`new_raw`](Self::new_raw) with the same `T`.
    pub unsafe fn delete_raw<T>(&self, ptr: *mut T) {
        let guard = self.lock.acquire();
        let header_size = size_of::<P::Header>();
        let payload = self.resolve(ptr.cast::<u8>(), header_size);
        // SAFETY: `ptr` came from `new_raw`; the checks ran before the value
        // is moved out, and the rollback happens after
        let value = unsafe {
            let (header, header_at) = read_header::<P::Header>(&self.arena, payload);
            self.check_release(payload, header_at, header.start_offset(), header.end_offset());
            let value = ptr::read(ptr);
            self.roll_back(header.start_offset());
            value
        };
        self.counters_on_release();
        drop(guard);
        drop(value);
    }

    /// Allocates `count` clones of `value` with an array header in front
    ///
    /// # Safety
    /// Same as [`allocate`](Self::allocate).
    pub unsafe fn new_array_raw<T: Clone>(&self, count: usize, value: T) -> NonNull<T> {
        // SAFETY: forwarded contract; the allocation fits `count` elements
        unsafe {
            let ptr = self
                .allocate_array(count, size_of::<T>(), align_of::<T>())
                .cast::<T>();
            for index in 0..count {
                ptr.add(index).write(value.clone());
            }
            ptr
        }
    }

    /// Validates the array, drops every element in reverse order, then
    /// releases it
    ///
    /// A failed check panics before any element is dropped.
    ///
    /// # Safety
    /// Same as [`deallocate`](Self::deallocate); `ptr` came from
    /// [`new_array_raw`](Self::new_array_raw) with the same `T`.
    pub unsafe fn delete_array_raw<T>(&self, ptr: *mut T) {
        let header_size = size_of::<StackArrayHeader>();
        let payload = self.resolve(ptr.cast::<u8>(), header_size);
        // SAFETY: `ptr` came from `new_array_raw`, so `count` elements follow
        // the array header
        unsafe {
            let (header, header_at) = self.read_array_header(payload);
            let end = self.array_end(payload, header.count, size_of::<T>());
            self.release_array(payload, header_at, header.start_offset, end, || {
                drop_reverse(ptr, header.count);
            });
        }
    }

    // ========================================================================
    // Handle path: metadata kept in the returned handle
    // ========================================================================

    /// Moves `value` into a fresh allocation
    ///
    /// # Safety
    /// Same as [`allocate`](Self::allocate); the handle must not be used
    /// after its region is rolled back by a reset, a rewind or the release
    /// of an earlier allocation.
    pub unsafe fn new_object<T>(&self, value: T) -> StackBox<'_, T> {
        // SAFETY: forwarded contract
        unsafe { self.new_object_with(|| value) }
    }

    /// Allocates room for a `T` and constructs it with `f`
    ///
    /// `f` runs after the lock is released, so it may allocate from this
    /// allocator; anything it leaves allocated sits above the new object.
    ///
    /// # Safety
    /// Same as [`new_object`](Self::new_object).
    pub unsafe fn new_object_with<T>(&self, f: impl FnOnce() -> T) -> StackBox<'_, T> {
        let reservation = {
            let _guard = self.lock.acquire();
            // SAFETY: lock held; capacity is checked or guaranteed by the caller
            unsafe { self.reserve(size_of::<T>(), align_of::<T>(), 0) }
        };
        // SAFETY: the reservation is aligned for `T` and holds one element
        unsafe {
            let ptr = self.arena.ptr_at(reservation.payload).cast::<T>();
            ptr.write(f());
            StackBox::from_parts(ptr, StackHeader::new(reservation.start, reservation.end))
        }
    }

    /// Drops the boxed value and releases its allocation
    ///
    /// # Safety
    /// With `STACK` disabled, `value` must be the most recent live
    /// allocation.
    pub unsafe fn delete<T>(&self, value: StackBox<'_, T>) {
        let (ptr, header) = value.into_parts();
        let payload = self.resolve(ptr.as_ptr().cast::<u8>(), 0);
        let guard = self.lock.acquire();
        // SAFETY: the handle describes a live allocation holding a `T`
        let value = unsafe {
            self.check_release(payload, payload, header.start_offset, Some(header.end_offset));
            let value = ptr.read();
            self.roll_back(header.start_offset);
            value
        };
        self.counters_on_release();
        drop(guard);
        drop(value);
    }

    /// Allocates `count` clones of `value`
    ///
    /// # Safety
    /// Same as [`new_object`](Self::new_object).
    pub unsafe fn new_array<T: Clone>(&self, count: usize, value: T) -> StackArray<'_, T> {
        // SAFETY: forwarded contract
        unsafe { self.new_array_with(count, |_| value.clone()) }
    }

    /// Allocates `count` elements built by `f(index)` in ascending order
    ///
    /// # Safety
    /// Same as [`new_object`](Self::new_object).
    pub unsafe fn new_array_with<T>(
        &self,
        count: usize,
        mut f: impl FnMut(usize) -> T,
    ) -> StackArray<'_, T> {
        let size = self.array_size(count, size_of::<T>());
        let reservation = {
            let _guard = self.lock.acquire();
            // SAFETY: lock held; capacity is checked or guaranteed by the caller
            unsafe { self.reserve(size, align_of::<T>(), 0) }
        };
        // SAFETY: the reservation is aligned for `T` and holds `count` elements
        unsafe {
            let ptr = self.arena.ptr_at(reservation.payload).cast::<T>();
            for index in 0..count {
                ptr.add(index).write(f(index));
            }
            StackArray::from_parts(ptr, StackArrayHeader::new(reservation.start, count))
        }
    }

    /// Validates the array, drops every element in reverse order, then
    /// releases it
    ///
    /// A failed check panics before any element is dropped.
    ///
    /// # Safety
    /// Same as [`delete`](Self::delete).
    pub unsafe fn delete_array<T>(&self, array: StackArray<'_, T>) {
        let (ptr, header) = array.into_parts();
        let payload = self.resolve(ptr.as_ptr().cast::<u8>(), 0);
        let end = self.array_end(payload, header.count, size_of::<T>());
        // SAFETY: the handle describes `count` live elements
        unsafe {
            self.release_array(payload, payload, header.start_offset, end, || {
                drop_reverse(ptr.as_ptr(), header.count);
            });
        }
    }

    /// Reserves `size` untyped bytes aligned to `alignment`
    ///
    /// # Safety
    /// Same as [`new_object`](Self::new_object).
    pub unsafe fn allocate_block(&self, size: usize, alignment: usize) -> StackBlock<'_> {
        let _guard = self.lock.acquire();
        // SAFETY: lock held; capacity is checked or guaranteed by the caller
        unsafe {
            let reservation = self.reserve(size, alignment, 0);
            StackBlock::from_parts(
                self.arena.ptr_at(reservation.payload),
                size,
                StackHeader::new(reservation.start, reservation.end),
            )
        }
    }

    /// Releases a block made with [`allocate_block`](Self::allocate_block)
    ///
    /// # Safety
    /// Same as [`delete`](Self::delete).
    pub unsafe fn deallocate_block(&self, block: StackBlock<'_>) {
        let (ptr, _, header) = block.into_parts();
        let payload = self.resolve(ptr.as_ptr(), 0);
        let _guard = self.lock.acquire();
        // SAFETY: lock held; the handle describes a live block
        unsafe {
            self.check_release(payload, payload, header.start_offset, Some(header.end_offset));
        }
        self.roll_back(header.start_offset);
        self.counters_on_release();
    }

    // ========================================================================
    // Bulk release
    // ========================================================================

    /// Releases every allocation in O(1)
    ///
    /// # Safety
    /// No pointer or handle from this allocator is used afterwards.
    pub unsafe fn reset(&self) {
        let _guard = self.lock.acquire();
        self.roll_back(0);
        if self.config.track_stats {
            self.counters.record_reset();
        }

        #[cfg(feature = "logging")]
        debug!(allocator = %self.config.debug_name, "stack allocator reset");
    }

    /// Captures the current offset
    pub fn mark(&self) -> StackMarker {
        StackMarker {
            offset: self.arena.offset(),
        }
    }

    /// Releases everything allocated after `marker` was taken
    ///
    /// # Panics
    /// With `STACK`, if the stack has already been unwound below the marker.
    ///
    /// # Safety
    /// `marker` came from this allocator, and nothing allocated after it is
    /// used afterwards.
    pub unsafe fn rewind(&self, marker: StackMarker) {
        let _guard = self.lock.acquire();
        let current = self.arena.offset();
        if P::STACK_CHECK && marker.offset > current {
            self.violation(StackError::out_of_order(self.debug_name(), marker.offset, current));
        }
        self.roll_back(marker.offset);
    }

    /// Scope guard that rewinds to the current offset when dropped
    ///
    /// See [`StackFrame::new`] for when dropping the frame panics.
    ///
    /// # Safety
    /// Same as [`StackFrame::new`].
    pub unsafe fn frame(&self) -> StackFrame<'_, 'r, P> {
        // SAFETY: forwarded contract
        unsafe { StackFrame::new(self) }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Places a `size`-byte payload with `header_size` bytes in front of it,
    /// writes the guards and advances the offset
    ///
    /// # Safety
    /// The lock is held. Without `SIZE`, the allocation fits.
    unsafe fn reserve(&self, size: usize, alignment: usize, header_size: usize) -> Reservation {
        if !alignment.is_power_of_two() {
            self.violation(StackError::invalid_alignment(alignment));
        }

        let current = self.arena.offset();
        let total = self.arena.capacity();
        let metadata = header_size + P::FRONT_GUARD_SIZE;
        let placement = padding_with_header(self.arena.start_address() + current, alignment, metadata)
            .ok()
            .and_then(|padding| {
                let payload = current.checked_add(padding)?;
                let end = payload.checked_add(size)?.checked_add(P::BACK_GUARD_SIZE)?;
                Some((payload, end))
            });
        let Some((payload, end)) = placement else {
            self.violation(StackError::out_of_memory(self.debug_name(), size, current, total));
        };

        if P::SIZE_CHECK && end > total {
            self.violation(StackError::out_of_memory(self.debug_name(), size, current, total));
        }
        debug_assert!(end <= total, "allocation past the arena end");

        if P::BOUNDS_CHECK {
            // SAFETY: [front, payload) and [payload + size, end) are inside
            // the range reserved above
            unsafe {
                write_guards(
                    &self.arena,
                    payload - metadata,
                    payload,
                    size,
                    current,
                );
            }
        }
        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: the payload range is reserved and not yet handed out
            unsafe { self.arena.fill(payload, size, pattern) }
        }

        self.arena.set_offset(end);
        if self.config.track_stats {
            self.counters.record_allocation(end);
        }
        self.report_usage(end);

        #[cfg(feature = "logging")]
        trace!(
            allocator = %self.config.debug_name,
            start = current,
            payload,
            end,
            size,
            alignment,
            "allocated"
        );

        Reservation {
            start: current,
            payload,
            end,
        }
    }

    /// Converts a caller pointer to a payload offset, applying the null and
    /// ownership checks
    ///
    /// Handle-path deletes pass a `header_size` of 0: their payload only
    /// needs room for the front guard.
    fn resolve(&self, ptr: *const u8, header_size: usize) -> Offset {
        if P::NULL_CHECK && ptr.is_null() {
            self.violation(StackError::null_pointer(self.debug_name()));
        }
        let address = ptr.addr();
        let payload = self.arena.offset_of(address);
        // a payload too close to the start cannot have metadata in front of it
        if P::OWNERSHIP_CHECK
            && (!self.arena.owns(address) || payload < header_size + P::FRONT_GUARD_SIZE)
        {
            self.violation(StackError::not_owned(self.debug_name(), address));
        }
        payload
    }

    /// Order and guard checks before the stack rolls back to `start`
    ///
    /// `metadata` is where the front guard ends: the header offset on the
    /// pointer path, the payload itself on the handle path.
    ///
    /// # Safety
    /// The lock is held and `metadata <= payload` are offsets of this arena.
    unsafe fn check_release(
        &self,
        payload: Offset,
        metadata: Offset,
        start: Offset,
        end: Option<Offset>,
    ) {
        let current = self.arena.offset();
        if P::STACK_CHECK
            && let Some(end) = end
            && end != current
        {
            self.violation(StackError::out_of_order(self.debug_name(), end, current));
        }

        if P::BOUNDS_CHECK {
            let address = self.arena.start_address() + payload;
            let Some(front) = metadata.checked_sub(P::FRONT_GUARD_SIZE) else {
                self.violation(StackError::corruption(
                    self.debug_name(),
                    payload,
                    address,
                    "no room for the front guard",
                ));
            };
            // SAFETY: front guard lies before the payload, inside the arena
            if let Err(violation) = unsafe { check_guards(&self.arena, front, payload, start) } {
                self.violation(StackError::corruption(
                    self.debug_name(),
                    payload,
                    address,
                    &violation.to_string(),
                ));
            }
        }
    }

    /// Moves the offset down to `offset`, filling the released bytes
    fn roll_back(&self, offset: Offset) {
        let current = self.arena.offset();
        if let Some(pattern) = self.config.dealloc_pattern
            && offset < current
        {
            // SAFETY: the range was allocated and is released right now
            unsafe { self.arena.fill(offset, current - offset, pattern) }
        }

        self.arena.set_offset(offset);
        self.report_usage(offset);

        #[cfg(feature = "logging")]
        trace!(
            allocator = %self.config.debug_name,
            from = current,
            to = offset,
            "released"
        );
    }

    /// Array header preceding the payload at `payload`, and its offset
    ///
    /// # Safety
    /// An array header was written for this payload.
    unsafe fn read_array_header(&self, payload: Offset) -> (StackArrayHeader, Offset) {
        // SAFETY: caller contract
        unsafe { read_header::<StackArrayHeader>(&self.arena, payload) }
    }

    /// Checks an array, runs `destruct` outside the lock, then rolls back
    ///
    /// The checks run again before the rollback, so an allocation a
    /// destructor left behind is reported instead of being released with
    /// the array.
    ///
    /// # Safety
    /// Same as [`check_release`](Self::check_release) minus the lock;
    /// `destruct` drops the array's elements exactly once.
    unsafe fn release_array(
        &self,
        payload: Offset,
        metadata: Offset,
        start: Offset,
        end: Offset,
        destruct: impl FnOnce(),
    ) {
        {
            let _guard = self.lock.acquire();
            // SAFETY: lock held; offsets forwarded from the caller
            unsafe { self.check_release(payload, metadata, start, Some(end)) };
        }
        destruct();

        let _guard = self.lock.acquire();
        // SAFETY: lock held; offsets forwarded from the caller
        unsafe { self.check_release(payload, metadata, start, Some(end)) };
        self.roll_back(start);
        self.counters_on_release();
    }

    fn array_size(&self, count: usize, element_size: usize) -> usize {
        count.checked_mul(element_size).unwrap_or_else(|| {
            self.violation(StackError::out_of_memory(
                self.debug_name(),
                usize::MAX,
                self.used_size(),
                self.total_size(),
            ))
        })
    }

    /// End offset of an array; saturates so a damaged count fails the
    /// order check instead of overflowing
    fn array_end(&self, payload: Offset, count: usize, element_size: usize) -> Offset {
        count
            .checked_mul(element_size)
            .and_then(|bytes| payload.checked_add(bytes))
            .and_then(|end| end.checked_add(P::BACK_GUARD_SIZE))
            .unwrap_or(usize::MAX)
    }

    #[inline]
    fn counters_on_release(&self) {
        if self.config.track_stats {
            self.counters.record_deallocation();
        }
    }

    #[inline]
    fn report_usage(&self, used: usize) {
        if let Some(reporter) = self.reporter {
            reporter.on_usage_changed(&self.config.debug_name, used, self.arena.capacity());
        }
    }

    /// Logs and panics on a broken allocator contract
    #[cold]
    #[inline(never)]
    #[track_caller]
    fn violation(&self, error: StackError) -> ! {
        #[cfg(feature = "logging")]
        error!(
            allocator = %self.config.debug_name,
            code = error.code(),
            %error,
            "stack allocator contract violated"
        );
        panic!("[{}] {error}", self.config.debug_name)
    }
}

/// Drops `count` elements starting at `ptr`, last element first
///
/// # Safety
/// `ptr` points to `count` initialized elements that are not used again.
unsafe fn drop_reverse<T>(ptr: *mut T, count: usize) {
    for index in (0..count).rev() {
        // SAFETY: index < count (caller contract)
        unsafe { ptr::drop_in_place(ptr.add(index)) }
    }
}

impl<P: StackPolicy> fmt::Debug for StackAllocator<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackAllocator")
            .field("name", &self.config.debug_name)
            .field("used", &self.used_size())
            .field("total", &self.total_size())
            .field("policy", &P::config())
            .field("has_reporter", &self.reporter.is_some())
            .finish()
    }
}
