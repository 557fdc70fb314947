//! Common types and constants for the stack allocator

/// Byte distance from the arena's start address
pub type Offset = usize;

/// Memory alignment requirements
pub mod alignment {
    /// Default payload alignment when the caller does not specify one
    pub const DEFAULT_ALIGN: usize = 8;

    /// Cache line size; the arena base is aligned to it
    pub const CACHE_LINE: usize = 64;

    /// Alignment of every arena's backing buffer
    pub const ARENA_ALIGN: usize = CACHE_LINE;
}

/// Memory size constants
pub mod size {
    /// 1 Kilobyte
    pub const KB: usize = 1024;

    /// 1 Megabyte
    pub const MB: usize = 1024 * KB;

    /// 1 Gigabyte
    pub const GB: usize = 1024 * MB;
}
