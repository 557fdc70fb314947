//! Fixed-size backing buffer with an offset cursor
//!
//! # Safety
//!
//! This is the only place where the stack allocator touches raw memory:
//! - The buffer is obtained once from the global allocator with
//!   [`ARENA_ALIGN`] alignment and released once in `Drop`
//! - Every pointer handed out is derived from the base pointer with `add`,
//!   never rebuilt from an integer address
//! - Reads and writes of metadata are unaligned, because a header may sit in
//!   front of a payload whose alignment is smaller than the header's
//! - The cursor is an atomic so it can be read without the allocator lock;
//!   all writes to it happen inside the allocator's critical section
//!
//! ## Invariants
//!
//! - `0 <= offset <= capacity` at all times
//! - `[start, start + capacity)` is exclusively owned by this arena

use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};
use std::alloc::{Layout, alloc_zeroed, dealloc};

use super::types::{Offset, alignment::ARENA_ALIGN};
use crate::error::{StackError, StackResult};

/// Contiguous, fixed-capacity byte buffer plus the current offset
pub struct Arena {
    ptr: NonNull<u8>,
    layout: Layout,
    offset: AtomicUsize,
}

impl Arena {
    /// Reserves `capacity` bytes up front
    pub fn new(capacity: usize) -> StackResult<Self> {
        if capacity == 0 {
            return Err(StackError::invalid_config("capacity cannot be zero"));
        }
        let layout = Layout::from_size_align(capacity, ARENA_ALIGN)
            .map_err(|_| StackError::invalid_config("capacity exceeds isize::MAX"))?;

        // SAFETY: Allocating raw memory from global allocator.
        // - Layout has non-zero size (checked above) and a power-of-two alignment
        // - Returned pointer is checked for null via NonNull::new
        // - Memory is deallocated in Drop with the same layout
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| StackError::out_of_memory("global allocator", capacity, 0, capacity))?;

        Ok(Self {
            ptr,
            layout,
            offset: AtomicUsize::new(0),
        })
    }

    /// Absolute address of the first byte
    #[inline]
    pub fn start_address(&self) -> usize {
        self.ptr.as_ptr().addr()
    }

    /// Total number of bytes in the buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Current top of the stack, as an offset
    #[inline]
    pub fn offset(&self) -> Offset {
        self.offset.load(Ordering::Acquire)
    }

    /// Moves the cursor; callers hold the allocator's critical section
    #[inline]
    pub fn set_offset(&self, offset: Offset) {
        debug_assert!(offset <= self.capacity(), "offset {offset} past arena end");
        self.offset.store(offset, Ordering::Release);
    }

    /// Whether `address` lies in `[start, start + capacity)`
    #[inline]
    pub fn owns(&self, address: usize) -> bool {
        let start = self.start_address();
        address >= start && address - start < self.capacity()
    }

    /// Offset of an absolute address; only meaningful for owned addresses
    #[inline]
    pub fn offset_of(&self, address: usize) -> Offset {
        address.wrapping_sub(self.start_address())
    }

    /// Pointer to the byte at `offset`
    ///
    /// # Safety
    /// `offset <= capacity`.
    #[inline]
    pub unsafe fn ptr_at(&self, offset: Offset) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity());
        // SAFETY: offset is within the allocation or one past its end (caller contract)
        unsafe { self.ptr.add(offset) }
    }

    /// Stores `value` at `offset` without alignment requirements
    ///
    /// # Safety
    /// `offset + size_of::<T>() <= capacity`, and no live payload overlaps
    /// the written range.
    #[inline]
    pub unsafe fn write<T>(&self, offset: Offset, value: T) {
        debug_assert!(offset + size_of::<T>() <= self.capacity());
        // SAFETY: range is inside the buffer (caller contract); unaligned write
        // has no alignment precondition
        unsafe { ptr::write_unaligned(self.ptr_at(offset).as_ptr().cast::<T>(), value) }
    }

    /// Loads a `T` previously stored at `offset`
    ///
    /// # Safety
    /// `offset + size_of::<T>() <= capacity` and the bytes form a valid `T`.
    #[inline]
    pub unsafe fn read<T: Copy>(&self, offset: Offset) -> T {
        debug_assert!(offset + size_of::<T>() <= self.capacity());
        // SAFETY: range is inside the buffer and initialized (caller contract)
        unsafe { ptr::read_unaligned(self.ptr_at(offset).as_ptr().cast::<T>()) }
    }

    /// Overwrites `len` bytes starting at `offset` with `byte`
    ///
    /// # Safety
    /// `offset + len <= capacity`, and no live payload overlaps the range.
    #[inline]
    pub unsafe fn fill(&self, offset: Offset, len: usize, byte: u8) {
        debug_assert!(offset + len <= self.capacity());
        // SAFETY: range is inside the buffer (caller contract)
        unsafe { ptr::write_bytes(self.ptr_at(offset).as_ptr(), byte, len) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: Deallocating memory allocated in new().
        // - self.ptr was allocated with alloc_zeroed() using self.layout
        // - Drop runs exactly once
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("start", &format_args!("{:#x}", self.start_address()))
            .field("capacity", &self.capacity())
            .field("offset", &self.offset())
            .finish()
    }
}

// SAFETY: Arena is Send because:
// - ptr points to a heap buffer exclusively owned by this value
// - layout and the atomic cursor are plain data
unsafe impl Send for Arena {}

// SAFETY: Arena is Sync because:
// - the cursor is atomic
// - every method that writes bytes is unsafe and requires the caller to
//   hold exclusive access to the written range (the allocator's lock, or a
//   `!Sync` allocator)
unsafe impl Sync for Arena {}
