//! Per-allocation headers stored in the padding in front of a payload
//!
//! ```text
//! ... | padding | header | payload ... |
//!               ^        ^
//!               |        payload offset (returned to the caller)
//!               payload offset - size_of::<H>()
//! ```

use core::fmt;

use crate::core::{Arena, Offset};

/// Header of a single-object allocation when stack order is verified
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackHeader {
    /// Offset the stack rolls back to when this allocation is freed
    pub start_offset: Offset,
    /// Stack top right after this allocation was made
    pub end_offset: Offset,
}

/// Header of a single-object allocation when stack order is not verified
///
/// The end offset is only needed for the order check, so it is not stored.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactHeader {
    /// Offset the stack rolls back to when this allocation is freed
    pub start_offset: Offset,
}

/// Header of an array allocation
///
/// The end offset is recomputed from `count` and the element size.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackArrayHeader {
    /// Offset the stack rolls back to when this array is freed
    pub start_offset: Offset,
    /// Number of elements
    pub count: usize,
}

impl StackHeader {
    pub const fn new(start_offset: Offset, end_offset: Offset) -> Self {
        Self {
            start_offset,
            end_offset,
        }
    }
}

impl StackArrayHeader {
    pub const fn new(start_offset: Offset, count: usize) -> Self {
        Self {
            start_offset,
            count,
        }
    }
}

/// Shape of the in-memory header for object allocations
///
/// Selected by the allocator policy: [`StackHeader`] with stack checking,
/// [`CompactHeader`] without.
pub trait ObjectHeader: Copy + fmt::Debug + Send + Sync + 'static {
    /// Builds the header for an allocation spanning `[start_offset, end_offset)`
    fn new(start_offset: Offset, end_offset: Offset) -> Self;

    /// Offset the stack rolls back to
    fn start_offset(&self) -> Offset;

    /// Recorded end offset, if this header shape stores one
    fn end_offset(&self) -> Option<Offset>;
}

impl ObjectHeader for StackHeader {
    #[inline(always)]
    fn new(start_offset: Offset, end_offset: Offset) -> Self {
        Self::new(start_offset, end_offset)
    }

    #[inline(always)]
    fn start_offset(&self) -> Offset {
        self.start_offset
    }

    #[inline(always)]
    fn end_offset(&self) -> Option<Offset> {
        Some(self.end_offset)
    }
}

impl ObjectHeader for CompactHeader {
    #[inline(always)]
    fn new(start_offset: Offset, _end_offset: Offset) -> Self {
        Self { start_offset }
    }

    #[inline(always)]
    fn start_offset(&self) -> Offset {
        self.start_offset
    }

    #[inline(always)]
    fn end_offset(&self) -> Option<Offset> {
        None
    }
}

/// Stores `header` directly in front of the payload at `payload`
///
/// # Safety
/// `size_of::<H>() <= payload <= arena.capacity()`, and the header bytes do
/// not overlap a live payload.
#[inline(always)]
pub unsafe fn write_header<H>(arena: &Arena, payload: Offset, header: H) {
    // SAFETY: the header range lies inside the padding reserved for it (caller contract)
    unsafe { arena.write(payload - size_of::<H>(), header) }
}

/// Reads the header in front of the payload at `payload`
///
/// Returns the header and its own offset, which is where the front guard
/// ends.
///
/// # Safety
/// A header of type `H` was written for this payload with [`write_header`].
#[inline(always)]
pub unsafe fn read_header<H: Copy>(arena: &Arena, payload: Offset) -> (H, Offset) {
    let header_offset = payload - size_of::<H>();
    // SAFETY: the header was written at this offset (caller contract)
    (unsafe { arena.read(header_offset) }, header_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_header_drops_end_offset() {
        assert_eq!(size_of::<CompactHeader>(), size_of::<Offset>());
        assert_eq!(size_of::<StackHeader>(), 2 * size_of::<Offset>());
        assert_eq!(<CompactHeader as ObjectHeader>::new(4, 40).end_offset(), None);
        assert_eq!(<StackHeader as ObjectHeader>::new(4, 40).end_offset(), Some(40));
    }

    #[test]
    fn test_header_sits_directly_before_payload() {
        let arena = Arena::new(64).unwrap();
        let payload = 24;
        unsafe {
            write_header(&arena, payload, StackHeader::new(0, 40));
            let (header, header_offset): (StackHeader, _) = read_header(&arena, payload);
            assert_eq!(header, StackHeader::new(0, 40));
            assert_eq!(header_offset, payload - size_of::<StackHeader>());
        }
    }

    #[test]
    fn test_array_header_round_trip_at_unaligned_payload() {
        let arena = Arena::new(64).unwrap();
        unsafe {
            write_header(&arena, 21, StackArrayHeader::new(3, 5));
            let (header, _): (StackArrayHeader, _) = read_header(&arena, 21);
            assert_eq!(header.start_offset, 3);
            assert_eq!(header.count, 5);
        }
    }
}
