//! Core types - pure abstractions shared across the codebase.

mod mode;
pub mod path;

pub use mode::ResolveMode;
