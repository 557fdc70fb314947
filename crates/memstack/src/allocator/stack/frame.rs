//! RAII-based stack frame for automatic restoration

use super::{StackAllocator, StackMarker, StackPolicy};

/// RAII helper for stack-based scoped allocation
///
/// Restores the allocator to the offset it had when the frame was created
/// once the frame goes out of scope, releasing everything allocated inside
/// it in one step.
pub struct StackFrame<'a, 'r, P: StackPolicy> {
    allocator: &'a StackAllocator<'r, P>,
    marker: StackMarker,
}

impl<'a, 'r, P: StackPolicy> StackFrame<'a, 'r, P> {
    /// Creates a frame that rewinds to the current offset when dropped
    ///
    /// # Panics
    /// With `STACK`, dropping the frame panics if the stack was unwound
    /// below its marker while the frame was alive, for example by releasing
    /// an allocation made before the frame. If that drop runs while another
    /// panic is already unwinding, the process aborts.
    ///
    /// # Safety
    /// No pointer or handle obtained from `allocator` while the frame is
    /// alive may be used after the frame is dropped.
    pub unsafe fn new(allocator: &'a StackAllocator<'r, P>) -> Self {
        let marker = allocator.mark();
        Self { allocator, marker }
    }

    /// Gets the underlying allocator
    pub fn allocator(&self) -> &'a StackAllocator<'r, P> {
        self.allocator
    }

    /// Marker this frame rewinds to
    pub fn marker(&self) -> StackMarker {
        self.marker
    }

    /// Manually restore and consume this frame
    pub fn restore(self) {
        // Drop will handle the restoration
        drop(self);
    }
}

impl<P: StackPolicy> Drop for StackFrame<'_, '_, P> {
    fn drop(&mut self) {
        // SAFETY: allocations made inside the frame are not used past it
        // (contract of `StackFrame::new`)
        unsafe { self.allocator.rewind(self.marker) }
    }
}
