//! Shared helpers with no domain knowledge.

pub mod hash;
