//! Address alignment helpers
//!
//! Pure arithmetic used by the stack allocator to place payloads and the
//! metadata that precedes them. Nothing here touches memory.

use crate::error::{StackError, StackResult};

/// Aligns a value up to the nearest multiple of `alignment`
///
/// Fails with [`StackError::InvalidAlignment`] when `alignment` is not a power
/// of two, and with [`StackError::OutOfMemory`] when the result would not fit
/// in a `usize`.
///
/// # Examples
/// ```
/// use memstack::utils::align_up;
///
/// assert_eq!(align_up(7, 8).unwrap(), 8);
/// assert_eq!(align_up(8, 8).unwrap(), 8);
/// assert_eq!(align_up(9, 8).unwrap(), 16);
/// assert!(align_up(9, 6).is_err());
/// ```
#[inline(always)]
pub fn align_up(value: usize, alignment: usize) -> StackResult<usize> {
    if !alignment.is_power_of_two() {
        return Err(StackError::invalid_alignment(alignment));
    }
    let mask = alignment - 1;
    value
        .checked_add(mask)
        .map(|bumped| bumped & !mask)
        .ok_or_else(|| StackError::out_of_memory("address space", alignment, value, usize::MAX))
}

/// Checks if a value is aligned to the given alignment
///
/// # Examples
/// ```
/// use memstack::utils::is_aligned;
///
/// assert!(is_aligned(16, 8));
/// assert!(!is_aligned(17, 8));
/// ```
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Calculates padding needed to align a value
///
/// # Examples
/// ```
/// use memstack::utils::padding_needed;
///
/// assert_eq!(padding_needed(7, 8).unwrap(), 1);
/// assert_eq!(padding_needed(8, 8).unwrap(), 0);
/// ```
#[inline(always)]
pub fn padding_needed(value: usize, alignment: usize) -> StackResult<usize> {
    Ok(align_up(value, alignment)? - value)
}

/// Padding that both aligns the payload and reserves `header_size` bytes
/// directly in front of it
///
/// The payload lands at `align_up(base + header_size, alignment)`; the header
/// occupies `[payload - header_size, payload)`, which never starts before
/// `base`.
///
/// ```text
/// base                      payload
///  |<-- slack -->|<- header ->|<- data ...
///  |<-------- padding ------->|
/// ```
///
/// # Examples
/// ```
/// use memstack::utils::padding_with_header;
///
/// // 16 bytes of header in front of an 8-aligned payload at base 4
/// assert_eq!(padding_with_header(4, 8, 16).unwrap(), 20);
/// // no header degenerates to plain alignment padding
/// assert_eq!(padding_with_header(4, 8, 0).unwrap(), 4);
/// ```
#[inline(always)]
pub fn padding_with_header(base: usize, alignment: usize, header_size: usize) -> StackResult<usize> {
    let with_header = base
        .checked_add(header_size)
        .ok_or_else(|| StackError::out_of_memory("address space", header_size, base, usize::MAX))?;
    Ok(align_up(with_header, alignment)? - base)
}
