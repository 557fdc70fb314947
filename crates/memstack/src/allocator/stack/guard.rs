//! Bound guards for memory-stomping detection
//!
//! ```text
//! | front guard | header | payload ... | back guard |
//! ```
//!
//! Both guards record the offset the stack rolls back to when the allocation
//! is freed. A write past the end of the payload, or a write by an earlier
//! allocation into this one's metadata, changes one of them.

use core::fmt;

use crate::core::{Arena, Offset};

/// Stored offsets are XOR-ed with this word, so a zeroed or pattern-filled
/// guard never decodes to a plausible offset by accident.
const GUARD_MAGIC: usize = usize::MAX / 0xFF * 0xA5;

/// Guard written in front of the header
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardFront {
    offset: usize,
    /// Payload size in bytes; locates the back guard
    pub allocation_size: usize,
}

/// Guard written right after the payload
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardBack {
    offset: usize,
}

impl GuardFront {
    pub const SIZE: usize = size_of::<Self>();

    pub const fn new(rollback_offset: Offset, allocation_size: usize) -> Self {
        Self {
            offset: rollback_offset ^ GUARD_MAGIC,
            allocation_size,
        }
    }

    /// Offset this guard says the stack rolls back to
    pub const fn rollback_offset(&self) -> Offset {
        self.offset ^ GUARD_MAGIC
    }
}

impl GuardBack {
    pub const SIZE: usize = size_of::<Self>();

    pub const fn new(rollback_offset: Offset) -> Self {
        Self {
            offset: rollback_offset ^ GUARD_MAGIC,
        }
    }

    /// Offset this guard says the stack rolls back to
    pub const fn rollback_offset(&self) -> Offset {
        self.offset ^ GUARD_MAGIC
    }
}

/// Which guard failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    /// Front guard records a different rollback offset
    Front { found: Offset, expected: Offset },
    /// Front guard's size would put the back guard outside the arena
    FrontSize { allocation_size: usize },
    /// Back guard records a different rollback offset
    Back { found: Offset, expected: Offset },
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front { found, expected } => {
                write!(f, "front guard holds offset {found}, expected {expected}")
            }
            Self::FrontSize { allocation_size } => {
                write!(f, "front guard size {allocation_size} runs past the arena")
            }
            Self::Back { found, expected } => {
                write!(f, "back guard holds offset {found}, expected {expected}")
            }
        }
    }
}

/// Writes the front guard at `front` and the back guard right after the
/// `size`-byte payload at `payload`
///
/// # Safety
/// `front + GuardFront::SIZE <= payload` and
/// `payload + size + GuardBack::SIZE <= arena.capacity()`; neither range
/// overlaps a live payload.
#[inline]
pub unsafe fn write_guards(
    arena: &Arena,
    front: Offset,
    payload: Offset,
    size: usize,
    rollback_offset: Offset,
) {
    // SAFETY: both ranges were reserved by the caller
    unsafe {
        arena.write(front, GuardFront::new(rollback_offset, size));
        arena.write(payload + size, GuardBack::new(rollback_offset));
    }
}

/// Validates both guards of the allocation at `payload` against the offset
/// the stack is about to roll back to
///
/// # Safety
/// `front` is the offset the front guard was written at, and
/// `front + GuardFront::SIZE <= arena.capacity()`.
#[inline]
pub unsafe fn check_guards(
    arena: &Arena,
    front: Offset,
    payload: Offset,
    new_offset: Offset,
) -> Result<(), GuardViolation> {
    // SAFETY: the front guard range is inside the arena (caller contract)
    let front_guard: GuardFront = unsafe { arena.read(front) };
    if front_guard.rollback_offset() != new_offset {
        return Err(GuardViolation::Front {
            found: front_guard.rollback_offset(),
            expected: new_offset,
        });
    }

    let back = payload
        .checked_add(front_guard.allocation_size)
        .filter(|back| {
            back.checked_add(GuardBack::SIZE)
                .is_some_and(|end| end <= arena.capacity())
        })
        .ok_or(GuardViolation::FrontSize {
            allocation_size: front_guard.allocation_size,
        })?;

    // SAFETY: the back guard range was bounds-checked just above
    let back_guard: GuardBack = unsafe { arena.read(back) };
    if back_guard.rollback_offset() != new_offset {
        return Err(GuardViolation::Back {
            found: back_guard.rollback_offset(),
            expected: new_offset,
        });
    }
    Ok(())
}
