//! Reader handler: one entry point for both filesystem and generated
//! resources.
//!
//! The mapping resolver and assembler never care where content comes
//! from; the handler inspects the path and either reads it from the
//! filesystem root or routes it through the generator registry (passing
//! the current variant point along for variant-aware generators).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::bundle::variant::{VariantMap, VariantPoint};
use crate::error::EngineError;
use crate::generator::GeneratorRegistry;
use crate::reader::{FsResourceReader, ResourceReader};

pub struct ReaderHandler {
    fs: FsResourceReader,
    registry: Arc<GeneratorRegistry>,
    charset: String,
}

impl ReaderHandler {
    pub fn new(fs: FsResourceReader, registry: Arc<GeneratorRegistry>, charset: String) -> Self {
        Self {
            fs,
            registry,
            charset,
        }
    }

    #[inline]
    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Whether the path is served by a registered generator prefix.
    #[inline]
    pub fn is_generated(&self, path: &str) -> bool {
        self.registry.is_generated_path(path)
    }

    /// Read a resource for a specific variant point. Generated paths get
    /// their per-variant concrete form from the owning generator;
    /// filesystem paths ignore the variant.
    pub fn get_resource_variant(
        &self,
        path: &str,
        variant: Option<&VariantPoint>,
    ) -> Result<String, EngineError> {
        if self.is_generated(path) {
            self.registry
                .create_resource(path, variant, &self.fs, &self.charset)
        } else {
            self.fs.get_resource(path)
        }
    }

    /// The variant axes a generated member contributes, if any.
    pub fn variants_for(&self, path: &str) -> Option<VariantMap> {
        if !self.is_generated(path) {
            return None;
        }
        self.registry.variants_for(path, &self.fs)
    }
}

impl ResourceReader for ReaderHandler {
    fn get_resource(&self, path: &str) -> Result<String, EngineError> {
        self.get_resource_variant(path, None)
    }

    fn get_resource_names(&self, dir_path: &str) -> BTreeSet<String> {
        if self.is_generated(dir_path) {
            // Generators do not expose directory listings
            return BTreeSet::new();
        }
        self.fs.get_resource_names(dir_path)
    }

    fn is_directory(&self, path: &str) -> bool {
        !self.is_generated(path) && self.fs.is_directory(path)
    }
}
