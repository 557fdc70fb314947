//! Handles returned by the header-free allocation path
//!
//! A handle pairs the payload pointer with the offsets needed to release it,
//! so nothing is stored in the arena in front of the payload. Handles borrow
//! the allocator and are consumed by the matching `delete*` call; dropping a
//! handle without deleting it leaks the value until the allocator is reset or
//! rewound.

use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use super::header::{StackArrayHeader, StackHeader};
use crate::core::Offset;

/// Single object allocated with [`new_object`](super::StackAllocator::new_object)
pub struct StackBox<'a, T> {
    ptr: NonNull<T>,
    header: StackHeader,
    _marker: PhantomData<(&'a (), T)>,
}

impl<'a, T> StackBox<'a, T> {
    /// # Safety
    /// `ptr` points to an initialized `T` inside the allocation described by
    /// `header`.
    pub(super) unsafe fn from_parts(ptr: NonNull<T>, header: StackHeader) -> Self {
        Self {
            ptr,
            header,
            _marker: PhantomData,
        }
    }

    pub(super) fn into_parts(self) -> (NonNull<T>, StackHeader) {
        (self.ptr, self.header)
    }

    /// Payload pointer
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn header(&self) -> StackHeader {
        self.header
    }

    /// Offset the stack rolls back to when this object is deleted
    pub fn start_offset(&self) -> Offset {
        self.header.start_offset
    }

    /// Stack top right after this object was allocated
    pub fn end_offset(&self) -> Offset {
        self.header.end_offset
    }
}

impl<T> Deref for StackBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value is initialized and the region stays reserved
        // while the handle exists (contract of the allocating call)
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for StackBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as in `deref`; the handle is the only path to the value
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for StackBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackBox")
            .field("value", &**self)
            .field("start_offset", &self.header.start_offset)
            .field("end_offset", &self.header.end_offset)
            .finish()
    }
}

/// Array allocated with [`new_array`](super::StackAllocator::new_array)
pub struct StackArray<'a, T> {
    ptr: NonNull<T>,
    header: StackArrayHeader,
    _marker: PhantomData<(&'a (), T)>,
}

impl<'a, T> StackArray<'a, T> {
    /// # Safety
    /// `ptr` points to `header.count` initialized elements inside the
    /// allocation described by `header`.
    pub(super) unsafe fn from_parts(ptr: NonNull<T>, header: StackArrayHeader) -> Self {
        Self {
            ptr,
            header,
            _marker: PhantomData,
        }
    }

    pub(super) fn into_parts(self) -> (NonNull<T>, StackArrayHeader) {
        (self.ptr, self.header)
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn header(&self) -> StackArrayHeader {
        self.header
    }

    pub fn start_offset(&self) -> Offset {
        self.header.start_offset
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.header.count
    }
}

impl<T> Deref for StackArray<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: `count` elements are initialized and stay reserved while the
        // handle exists
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.header.count) }
    }
}

impl<T> DerefMut for StackArray<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: as in `deref`; the handle is the only path to the elements
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.header.count) }
    }
}

impl<T: fmt::Debug> fmt::Debug for StackArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackArray")
            .field("elements", &&**self)
            .field("start_offset", &self.header.start_offset)
            .finish()
    }
}

/// Untyped block allocated with
/// [`allocate_block`](super::StackAllocator::allocate_block)
///
/// The bytes are not guaranteed to be initialized.
#[derive(Debug)]
pub struct StackBlock<'a> {
    ptr: NonNull<u8>,
    size: usize,
    header: StackHeader,
    _marker: PhantomData<&'a ()>,
}

impl<'a> StackBlock<'a> {
    pub(super) fn from_parts(ptr: NonNull<u8>, size: usize, header: StackHeader) -> Self {
        Self {
            ptr,
            size,
            header,
            _marker: PhantomData,
        }
    }

    pub(super) fn into_parts(self) -> (NonNull<u8>, usize, StackHeader) {
        (self.ptr, self.size, self.header)
    }

    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Requested size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn header(&self) -> StackHeader {
        self.header
    }

    pub fn start_offset(&self) -> Offset {
        self.header.start_offset
    }

    pub fn end_offset(&self) -> Offset {
        self.header.end_offset
    }
}
