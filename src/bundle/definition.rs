//! The bundle entity: a named, ordered aggregation of source resources
//! served as one logical unit.
//!
//! `Bundle` is a closed sum over [`BundleKind`]: a *simple* bundle owns
//! the members its path mappings resolved to; a *composite* bundle owns
//! child bundles and aggregates their members. Bundles are constructed
//! once per configuration load and frozen afterward, except for the
//! once-only per-variant hash token assignment during the build pass.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;

use crate::bundle::inclusion::InclusionPattern;
use crate::bundle::mapping::ResolvedMappings;
use crate::bundle::variant::{self, VariantMap};
use crate::core::path::as_path;
use crate::error::EngineError;
use crate::processor::PostProcessor;
use crate::utils::hash;

/// Simple vs composite membership.
#[derive(Debug)]
pub enum BundleKind {
    Simple,
    Composite { children: Vec<Bundle> },
}

#[derive(Debug)]
pub struct Bundle {
    /// Globally unique normalized path; the debug-mode request path and
    /// request-time lookup key.
    pub id: String,
    /// Human-readable identifier from the configuration; the production
    /// URL's file segment.
    pub name: String,
    /// Resource type suffix, e.g. `.js` or `.css`.
    pub file_extension: String,
    pub inclusion: InclusionPattern,
    pub kind: BundleKind,
    /// Ordered member paths; the concatenation order. Frozen after
    /// construction - concurrent readers work off the registry snapshot.
    pub item_paths: Vec<String>,
    pub license_paths: BTreeSet<String>,
    /// Variant axes this bundle is built once per combination of.
    pub variants: VariantMap,
    /// Bundle names this bundle declares it must be assembled after.
    pub declared_dependencies: Vec<String>,
    /// All transitive dependency ids, most-foundational-first. Set once
    /// by the dependency resolver.
    resolved_dependencies: OnceLock<Vec<String>>,
    pub unitary_processor: Option<Arc<dyn PostProcessor>>,
    pub bundle_processor: Option<Arc<dyn PostProcessor>>,
    /// Presentation hints, passed through unmodified.
    pub alternate_production_url: Option<String>,
    pub explorer_conditional_expression: Option<String>,
    /// Per-variant cache-busting token, written exactly once per build
    /// pass. `None` key is "no variant", distinct from the empty key.
    tokens: DashMap<Option<String>, String>,
}

impl Bundle {
    /// A simple bundle from its resolved path mappings.
    pub fn simple(
        id: &str,
        name: impl Into<String>,
        file_extension: impl Into<String>,
        inclusion: InclusionPattern,
        mappings: ResolvedMappings,
    ) -> Self {
        Self {
            id: as_path(id),
            name: name.into(),
            file_extension: file_extension.into(),
            inclusion,
            kind: BundleKind::Simple,
            item_paths: mappings.items,
            license_paths: mappings.licenses,
            variants: VariantMap::new(),
            declared_dependencies: Vec::new(),
            resolved_dependencies: OnceLock::new(),
            unitary_processor: None,
            bundle_processor: None,
            alternate_production_url: None,
            explorer_conditional_expression: None,
            tokens: DashMap::new(),
        }
    }

    /// A composite bundle aggregating child bundles.
    ///
    /// The effective item list concatenates the children's items,
    /// filtered by each child's own inclusion pattern against the current
    /// mode. Children without a post-processor inherit the composite's;
    /// a child with its own keeps it. The composite's variants are the
    /// union of child variants - conflicting axis defaults fail.
    #[allow(clippy::too_many_arguments)]
    pub fn composite(
        id: &str,
        name: impl Into<String>,
        file_extension: impl Into<String>,
        inclusion: InclusionPattern,
        mut children: Vec<Bundle>,
        debug_on: bool,
        unitary_processor: Option<Arc<dyn PostProcessor>>,
        bundle_processor: Option<Arc<dyn PostProcessor>>,
    ) -> Result<Self, EngineError> {
        let mut item_paths = Vec::new();
        let mut license_paths = BTreeSet::new();
        let mut variants = VariantMap::new();

        for child in &mut children {
            if !child.inclusion.is_active(debug_on) {
                continue;
            }
            item_paths.extend(child.item_paths.iter().cloned());
            license_paths.extend(child.license_paths.iter().cloned());
            variants = variant::union_variants(&variants, &child.variants)?;

            if child.bundle_processor.is_none() {
                child.bundle_processor = bundle_processor.clone();
            }
            if child.unitary_processor.is_none() {
                child.unitary_processor = unitary_processor.clone();
            }
        }

        Ok(Self {
            id: as_path(id),
            name: name.into(),
            file_extension: file_extension.into(),
            inclusion,
            kind: BundleKind::Composite { children },
            item_paths,
            license_paths,
            variants,
            declared_dependencies: Vec::new(),
            resolved_dependencies: OnceLock::new(),
            unitary_processor,
            bundle_processor,
            alternate_production_url: None,
            explorer_conditional_expression: None,
            tokens: DashMap::new(),
        })
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, BundleKind::Composite { .. })
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.inclusion.is_global
    }

    /// All variant keys of the full variant space, empty when the bundle
    /// has no variants.
    pub fn variant_keys(&self) -> Vec<String> {
        variant::all_variant_keys(&self.variants)
    }

    // ------------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------------

    /// Record the resolved transitive dependency ids. Called once by the
    /// dependency resolver at bundle-set construction time.
    pub(crate) fn set_resolved_dependencies(&self, ids: Vec<String>) {
        self.resolved_dependencies.set(ids).ok();
    }

    /// All transitive dependencies, deduplicated, most-foundational-first:
    /// for every edge A -> B, B appears before A. Empty before the
    /// dependency resolution pass and for bundles without dependencies.
    pub fn dependencies(&self) -> &[String] {
        self.resolved_dependencies
            .get()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Cache-busting tokens
    // ------------------------------------------------------------------------

    /// Assign the cache-busting token for a variant from the 32-bit
    /// content hash. Called exactly once per (bundle, variant) per pass.
    pub fn set_hash_token(&self, variant_key: Option<&str>, content_hash: i32) {
        self.tokens.insert(
            variant_key.map(str::to_string),
            hash::hash_token(content_hash),
        );
    }

    /// Reinstall a token persisted by an earlier pass, so a restarted
    /// process can serve production requests without reassembling.
    pub fn restore_token(&self, variant_key: Option<&str>, token: String) {
        self.tokens.insert(variant_key.map(str::to_string), token);
    }

    /// The cache-busting token for a variant.
    ///
    /// # Panics
    ///
    /// Reading a token before the build pass assigned it is a programming
    /// error and panics; it is never silently defaulted.
    pub fn hash_token(&self, variant_key: Option<&str>) -> String {
        let key = variant_key.map(str::to_string);
        self.tokens
            .get(&key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| {
                panic!(
                    "hash token for bundle [{}] variant {:?} read before the build pass computed it",
                    self.id, variant_key
                )
            })
    }

    /// All (variant key, token) pairs assigned in this pass, for mapping
    /// persistence.
    pub fn token_entries(&self) -> Vec<(Option<String>, String)> {
        self.tokens
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::variant::VariantSet;
    use crate::processor::BundleProcessingStatus;

    fn simple(id: &str, items: Vec<&str>) -> Bundle {
        Bundle::simple(
            id,
            id.rsplit('/').next().unwrap().to_string(),
            ".js",
            InclusionPattern::context(),
            ResolvedMappings {
                items: items.into_iter().map(str::to_string).collect(),
                ..Default::default()
            },
        )
    }

    #[derive(Debug)]
    struct NamedProcessor(&'static str);

    impl PostProcessor for NamedProcessor {
        fn name(&self) -> &str {
            self.0
        }
        fn post_process(
            &self,
            _status: &BundleProcessingStatus,
            content: String,
        ) -> Result<String, EngineError> {
            Ok(content)
        }
    }

    #[test]
    fn test_simple_bundle_normalizes_id() {
        let bundle = simple("js//app.js", vec!["/js/a.js"]);
        assert_eq!(bundle.id, "/js/app.js");
        assert!(!bundle.is_composite());
    }

    #[test]
    fn test_hash_token_round_trip() {
        let bundle = simple("/js/app.js", vec![]);
        bundle.set_hash_token(None, -42);
        bundle.set_hash_token(Some("fr"), 7);

        assert_eq!(bundle.hash_token(None), "N42");
        assert_eq!(bundle.hash_token(Some("fr")), "7");
    }

    #[test]
    fn test_no_variant_distinct_from_empty_key() {
        let bundle = simple("/js/app.js", vec![]);
        bundle.set_hash_token(None, 1);
        bundle.set_hash_token(Some(""), 2);

        assert_eq!(bundle.hash_token(None), "1");
        assert_eq!(bundle.hash_token(Some("")), "2");
    }

    #[test]
    fn test_restore_token_installs_persisted_value() {
        let bundle = simple("/js/app.js", vec![]);
        bundle.restore_token(None, "N42".to_string());
        bundle.restore_token(Some("fr"), "7".to_string());

        assert_eq!(bundle.hash_token(None), "N42");
        assert_eq!(bundle.hash_token(Some("fr")), "7");
    }

    #[test]
    #[should_panic(expected = "before the build pass")]
    fn test_hash_token_before_build_panics() {
        let bundle = simple("/js/app.js", vec![]);
        bundle.hash_token(None);
    }

    #[test]
    fn test_composite_concatenates_visible_children() {
        let lib = simple("/js/lib.js", vec!["/js/lib/a.js", "/js/lib/b.js"]);
        let mut dbg_only = simple("/js/dev.js", vec!["/js/dev/trace.js"]);
        dbg_only.inclusion = InclusionPattern::context().debug_only();

        // Production mode: the debug-only child's members are dropped
        let composite = Bundle::composite(
            "/js/all.js",
            "all.js",
            ".js",
            InclusionPattern::context(),
            vec![lib, dbg_only],
            false,
            None,
            None,
        )
        .unwrap();

        assert_eq!(composite.item_paths, vec!["/js/lib/a.js", "/js/lib/b.js"]);
    }

    #[test]
    fn test_composite_processor_inheritance() {
        let plain = simple("/js/plain.js", vec!["/js/p.js"]);
        let mut opinionated = simple("/js/opinion.js", vec!["/js/o.js"]);
        opinionated.bundle_processor = Some(Arc::new(NamedProcessor("own")));

        let composite = Bundle::composite(
            "/js/all.js",
            "all.js",
            ".js",
            InclusionPattern::context(),
            vec![plain, opinionated],
            true,
            None,
            Some(Arc::new(NamedProcessor("inherited"))),
        )
        .unwrap();

        let BundleKind::Composite { children } = &composite.kind else {
            panic!("expected composite");
        };
        assert_eq!(children[0].bundle_processor.as_ref().unwrap().name(), "inherited");
        assert_eq!(children[1].bundle_processor.as_ref().unwrap().name(), "own");
    }

    #[test]
    fn test_composite_unions_child_variants() {
        let mut fr = simple("/js/fr.js", vec![]);
        fr.variants.insert(
            "locale".into(),
            VariantSet::new("locale", "", vec!["".into(), "fr".into()]),
        );
        let mut es = simple("/js/es.js", vec![]);
        es.variants.insert(
            "locale".into(),
            VariantSet::new("locale", "", vec!["".into(), "es".into()]),
        );

        let composite = Bundle::composite(
            "/js/i18n.js",
            "i18n.js",
            ".js",
            InclusionPattern::context(),
            vec![fr, es],
            true,
            None,
            None,
        )
        .unwrap();

        assert_eq!(composite.variants["locale"].keys, vec!["", "fr", "es"]);
    }

    #[test]
    fn test_dependencies_empty_before_resolution() {
        let bundle = simple("/js/app.js", vec![]);
        assert!(bundle.dependencies().is_empty());

        bundle.set_resolved_dependencies(vec!["/js/lib.js".into()]);
        assert_eq!(bundle.dependencies(), ["/js/lib.js"]);
    }
}
