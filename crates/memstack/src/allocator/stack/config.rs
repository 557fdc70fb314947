//! Stack allocator configuration
//!
//! Runtime settings that are not part of the compile-time policy.

use crate::core::alignment::DEFAULT_ALIGN;
use crate::error::{StackError, StackResult};

/// Name used when none is given
pub const DEFAULT_DEBUG_NAME: &str = "StackAllocator";

/// Configuration for stack allocator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    /// Name reported in logs, panics and usage reports
    pub debug_name: String,

    /// Alignment used by `allocate_default`; must be a power of two
    pub default_alignment: usize,

    /// Enable statistics tracking
    pub track_stats: bool,

    /// Fill patterns for debugging
    pub alloc_pattern: Option<u8>,
    pub dealloc_pattern: Option<u8>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            debug_name: DEFAULT_DEBUG_NAME.to_string(),
            default_alignment: DEFAULT_ALIGN,
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) { Some(0xCC) } else { None },
            dealloc_pattern: if cfg!(debug_assertions) { Some(0xDD) } else { None },
        }
    }
}

impl StackConfig {
    /// Production configuration - optimized for performance
    pub fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            ..Self::default()
        }
    }

    /// Debug configuration - optimized for debugging
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
            ..Self::default()
        }
    }

    /// Performance configuration - minimal overhead
    pub fn performance() -> Self {
        Self {
            debug_name: DEFAULT_DEBUG_NAME.to_string(),
            default_alignment: DEFAULT_ALIGN,
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = name.into();
        self
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.default_alignment = alignment;
        self
    }

    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    pub fn with_patterns(mut self, alloc: Option<u8>, dealloc: Option<u8>) -> Self {
        self.alloc_pattern = alloc;
        self.dealloc_pattern = dealloc;
        self
    }

    /// Checks the settings the allocator depends on
    pub fn validate(&self) -> StackResult<()> {
        if !self.default_alignment.is_power_of_two() {
            return Err(StackError::invalid_config(&format!(
                "default alignment {} is not a power of two",
                self.default_alignment
            )));
        }
        Ok(())
    }
}
