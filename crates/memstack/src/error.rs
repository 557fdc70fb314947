//! Standalone error types for memstack
//!
//! Uses thiserror for clean, idiomatic Rust error definitions.
//!
//! Construction errors are returned as [`StackResult`]. Every other variant
//! describes a broken allocator contract and is raised as a fatal panic by
//! the allocator that detected it (see [`crate::allocator::stack`]).

use thiserror::Error;

// ============================================================================
// Main Error Types
// ============================================================================

/// Stack allocator errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    // --- Capacity ---
    #[error(
        "allocator '{allocator}' is out of memory: requested {requested} bytes at offset {offset}, capacity {capacity}"
    )]
    OutOfMemory {
        allocator: String,
        requested: usize,
        offset: usize,
        capacity: usize,
    },

    #[error("invalid alignment: {alignment} is not a power of two")]
    InvalidAlignment { alignment: usize },

    // --- Deallocation contract ---
    #[error(
        "allocator '{allocator}' deallocated out of order: allocation ends at offset {end_offset}, stack top is {current_offset}"
    )]
    OutOfOrderDeallocation {
        allocator: String,
        end_offset: usize,
        current_offset: usize,
    },

    #[error("allocator '{allocator}' cannot deallocate a null pointer")]
    NullPointerDeallocation { allocator: String },

    #[error("allocator '{allocator}' does not own the pointer {address:#x}")]
    NotOwnedPointer { allocator: String, address: usize },

    #[error(
        "memory stomping detected in allocator '{allocator}' at offset {offset} and address {address:#x}: {details}"
    )]
    CorruptionDetected {
        allocator: String,
        offset: usize,
        address: usize,
        details: String,
    },

    // --- Construction ---
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl StackError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfMemory { .. } => "STACK:OOM",
            Self::InvalidAlignment { .. } => "STACK:ALIGN",
            Self::OutOfOrderDeallocation { .. } => "STACK:ORDER",
            Self::NullPointerDeallocation { .. } => "STACK:NULL",
            Self::NotOwnedPointer { .. } => "STACK:OWNERSHIP",
            Self::CorruptionDetected { .. } => "STACK:CORRUPTION",
            Self::InvalidConfig { .. } => "STACK:CONFIG",
        }
    }

    /// Whether this error reports a broken allocator contract rather than a
    /// rejected construction request
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create out of memory error
    pub fn out_of_memory(allocator: &str, requested: usize, offset: usize, capacity: usize) -> Self {
        Self::OutOfMemory {
            allocator: allocator.to_string(),
            requested,
            offset,
            capacity,
        }
    }

    /// Create invalid alignment error
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    /// Create out-of-order deallocation error
    pub fn out_of_order(allocator: &str, end_offset: usize, current_offset: usize) -> Self {
        Self::OutOfOrderDeallocation {
            allocator: allocator.to_string(),
            end_offset,
            current_offset,
        }
    }

    /// Create null pointer deallocation error
    pub fn null_pointer(allocator: &str) -> Self {
        Self::NullPointerDeallocation {
            allocator: allocator.to_string(),
        }
    }

    /// Create not owned pointer error
    pub fn not_owned(allocator: &str, address: usize) -> Self {
        Self::NotOwnedPointer {
            allocator: allocator.to_string(),
            address,
        }
    }

    /// Create memory corruption error
    pub fn corruption(allocator: &str, offset: usize, address: usize, details: &str) -> Self {
        Self::CorruptionDetected {
            allocator: allocator.to_string(),
            offset,
            address,
            details: details.to_string(),
        }
    }

    /// Create invalid config error
    pub fn invalid_config(reason: &str) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Result type for stack allocator operations
pub type StackResult<T> = core::result::Result<T, StackError>;

// ============================================================================
// Tests
// ============================================================================
