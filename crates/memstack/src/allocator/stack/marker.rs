//! Stack marker for position tracking

use crate::core::Offset;

/// Marker representing a position in the stack allocator
///
/// Can be used to rewind the allocator to this position, releasing all
/// allocations made after the marker was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StackMarker {
    pub(super) offset: Offset,
}

impl StackMarker {
    /// Offset captured by this marker
    #[inline]
    pub fn offset(&self) -> Offset {
        self.offset
    }
}
