//! Registry for resource generators, which synthesize script or CSS data
//! instead of reading a file.
//!
//! Path mappings that require generation use a colon-terminated prefix
//! (`messages:`, `sprite:`). The registry is a first-match prefix table;
//! generator implementations are instantiated lazily on the first use of
//! their prefix, so registering a generator costs nothing until a bundle
//! actually maps a path through it.

mod messages;

pub use messages::MessagesGenerator;

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::bundle::variant::{VariantMap, VariantPoint, VariantSet};
use crate::error::EngineError;
use crate::reader::ResourceReader;

/// Terminates every generator prefix (`messages:`).
pub const PREFIX_SEPARATOR: char = ':';

/// Context handed to a generator when creating a resource.
pub struct GeneratorContext<'a> {
    /// Full generated path, prefix included.
    pub path: &'a str,
    /// The variant point being built, if the bundle has variants.
    pub variant: Option<&'a VariantPoint>,
    /// Resource access for generators that derive content from files.
    pub reader: &'a dyn ResourceReader,
    /// Effective resource charset name.
    pub charset: &'a str,
}

impl GeneratorContext<'_> {
    /// The path with the generator prefix (up to and including the colon)
    /// stripped.
    pub fn suffix(&self) -> &str {
        match self.path.find(PREFIX_SEPARATOR) {
            Some(idx) => &self.path[idx + 1..],
            None => self.path,
        }
    }
}

/// A pluggable generator synthesizing resource content for one prefix.
pub trait ResourceGenerator: Send + Sync {
    /// Synthesize the content of a generated resource.
    fn create_resource(&self, ctx: &GeneratorContext) -> Result<String, EngineError>;

    /// For variant-aware generators: the variant axes available for a
    /// specific generated path.
    fn available_variants(
        &self,
        _path: &str,
        _reader: &dyn ResourceReader,
    ) -> Option<VariantMap> {
        None
    }

    /// For locale-aware generators: the locale keys available for a
    /// specific generated path. Normalized by the registry into a
    /// `locale` variant axis.
    fn available_locales(&self, _path: &str, _reader: &dyn ResourceReader) -> Option<Vec<String>> {
        None
    }
}

type GeneratorFactory = Box<dyn Fn() -> Arc<dyn ResourceGenerator> + Send + Sync>;

/// First-match prefix table of generator factories, with lazy instantiation.
pub struct GeneratorRegistry {
    /// (full prefix including colon, factory), in registration order.
    factories: Vec<(String, GeneratorFactory)>,
    /// Instantiated generators, keyed by full prefix.
    instances: RwLock<FxHashMap<String, Arc<dyn ResourceGenerator>>>,
}

impl GeneratorRegistry {
    /// An empty registry with no prefixes.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            instances: RwLock::new(FxHashMap::default()),
        }
    }

    /// The default registry: `messages:` wired to [`MessagesGenerator`].
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("messages", || Arc::new(MessagesGenerator::new()))
            .ok();
        registry
    }

    /// Register a generator factory for a prefix (without the colon).
    ///
    /// The factory runs at most once, on the first path that matches.
    pub fn register<F>(&mut self, prefix: &str, factory: F) -> Result<(), EngineError>
    where
        F: Fn() -> Arc<dyn ResourceGenerator> + Send + Sync + 'static,
    {
        let full_prefix = format!("{prefix}{PREFIX_SEPARATOR}");
        if self.factories.iter().any(|(p, _)| *p == full_prefix) {
            return Err(EngineError::DuplicateGeneratorPrefix(prefix.to_string()));
        }
        self.factories.push((full_prefix, Box::new(factory)));
        Ok(())
    }

    /// Whether a path mapping should be handled by a generator.
    pub fn is_generated_path(&self, path: &str) -> bool {
        self.matching_prefix(path).is_some()
    }

    fn matching_prefix(&self, path: &str) -> Option<&str> {
        self.factories
            .iter()
            .map(|(prefix, _)| prefix.as_str())
            .find(|prefix| path.starts_with(prefix))
    }

    /// The generator for a path, instantiating it on first use.
    pub fn generator_for(&self, path: &str) -> Option<Arc<dyn ResourceGenerator>> {
        let prefix = self.matching_prefix(path)?;

        if let Some(instance) = self.instances.read().get(prefix) {
            return Some(Arc::clone(instance));
        }

        let mut instances = self.instances.write();
        // Another thread may have instantiated while we waited for the lock
        if let Some(instance) = instances.get(prefix) {
            return Some(Arc::clone(instance));
        }
        let factory = &self
            .factories
            .iter()
            .find(|(p, _)| p.as_str() == prefix)?
            .1;
        let instance = factory();
        instances.insert(prefix.to_string(), Arc::clone(&instance));
        Some(instance)
    }

    /// Route a `create_resource` call to the generator owning the path.
    pub fn create_resource(
        &self,
        path: &str,
        variant: Option<&VariantPoint>,
        reader: &dyn ResourceReader,
        charset: &str,
    ) -> Result<String, EngineError> {
        let generator = self
            .generator_for(path)
            .ok_or_else(|| EngineError::NotFound(path.to_string()))?;
        generator.create_resource(&GeneratorContext {
            path,
            variant,
            reader,
            charset,
        })
    }

    /// The variant axes a generated path contributes to its bundle.
    ///
    /// Variant-aware generators report axes directly; locale-aware
    /// generators report locale keys, normalized here into a `locale`
    /// axis with an empty default so they share the bundle vocabulary.
    pub fn variants_for(&self, path: &str, reader: &dyn ResourceReader) -> Option<VariantMap> {
        let generator = self.generator_for(path)?;

        if let Some(variants) = generator.available_variants(path, reader) {
            return Some(variants);
        }

        let locales = generator.available_locales(path, reader)?;
        let mut keys = vec![String::new()];
        for locale in locales {
            if !locale.is_empty() && !keys.contains(&locale) {
                keys.push(locale);
            }
        }
        if keys.len() == 1 {
            return None;
        }
        let mut map = VariantMap::new();
        map.insert("locale".into(), VariantSet::new("locale", "", keys));
        Some(map)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
