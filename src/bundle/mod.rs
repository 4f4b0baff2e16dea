//! Bundle model: definitions, inclusion rules, variants, path mapping
//! expansion and dependency ordering.

pub mod definition;
pub mod dependency;
pub mod inclusion;
pub mod mapping;
pub mod variant;

pub use definition::{Bundle, BundleKind};
pub use inclusion::InclusionPattern;
