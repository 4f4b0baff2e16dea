//! Resource access: filesystem-backed readers and the handler that routes
//! generated paths to the generator registry.

mod fs;
mod handler;

pub use fs::FsResourceReader;
pub use handler::ReaderHandler;

use std::collections::BTreeSet;

use crate::error::EngineError;

/// Abstract resource access used by the engine.
///
/// Implementations must support both filesystem-backed and virtual
/// (generated) resolution transparently to the engine.
pub trait ResourceReader: Send + Sync {
    /// Full content of the resource at `path`. A missing resource is the
    /// distinct [`EngineError::NotFound`] outcome.
    fn get_resource(&self, path: &str) -> Result<String, EngineError>;

    /// Names of the direct children of a directory path. Empty for
    /// non-directories or unreadable paths.
    fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String>;

    /// Whether `path` refers to a directory.
    fn is_directory(&self, path: &str) -> bool;
}
