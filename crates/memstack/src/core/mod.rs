//! Core building blocks of the stack allocator
//!
//! - [`arena`]: the fixed backing buffer and its offset cursor
//! - [`types`]: offset type plus alignment and size constants

pub mod arena;
pub mod types;

pub use arena::Arena;
pub use types::*;
