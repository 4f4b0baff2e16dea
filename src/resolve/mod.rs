//! Request-time resolution: turning a bundle id into the ordered list of
//! paths a page must include.
//!
//! A [`BundleRegistry`] is an immutable snapshot of the active bundle
//! set, published atomically through [`RegistryHandle`] so in-flight
//! resolutions keep working off the snapshot they started with while a
//! rebuild swaps in a new one. Ordering is the invariant everything here
//! protects: globals first (by inclusion order), then dependencies
//! most-foundational-first, then the requested bundle, with duplicates
//! suppressed per page via [`RenderPass`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::bundle::Bundle;
use crate::bundle::variant::{self, VariantPoint, VariantResolver};
use crate::core::ResolveMode;
use crate::error::EngineError;

// ============================================================================
// Registry snapshot
// ============================================================================

/// Immutable snapshot of the active bundle set for one mode.
#[derive(Debug)]
pub struct BundleRegistry {
    bundles: Vec<Arc<Bundle>>,
    by_id: FxHashMap<String, Arc<Bundle>>,
    /// Globals active in the snapshot's mode, sorted by inclusion order.
    globals: Vec<Arc<Bundle>>,
    mode: ResolveMode,
    resolver: VariantResolver,
}

impl BundleRegistry {
    pub fn new(bundles: Vec<Arc<Bundle>>, mode: ResolveMode) -> Result<Self, EngineError> {
        let mut by_id: FxHashMap<String, Arc<Bundle>> = FxHashMap::default();
        for bundle in &bundles {
            if by_id
                .insert(bundle.id.clone(), Arc::clone(bundle))
                .is_some()
            {
                return Err(EngineError::DuplicateBundleId(bundle.id.clone()));
            }
        }

        let mut globals: Vec<Arc<Bundle>> = bundles
            .iter()
            .filter(|b| b.is_global() && b.inclusion.is_active(mode.is_debug()))
            .cloned()
            .collect();
        // Stable: equal orders keep declaration order
        globals.sort_by_key(|b| b.inclusion.inclusion_order);

        Ok(Self {
            bundles,
            by_id,
            globals,
            mode,
            resolver: VariantResolver::new(),
        })
    }

    #[inline]
    pub fn mode(&self) -> ResolveMode {
        self.mode
    }

    #[inline]
    pub fn get(&self, bundle_id: &str) -> Option<&Arc<Bundle>> {
        self.by_id.get(bundle_id)
    }

    #[inline]
    pub fn globals(&self) -> &[Arc<Bundle>] {
        &self.globals
    }

    #[inline]
    pub fn bundles(&self) -> &[Arc<Bundle>] {
        &self.bundles
    }
}

/// Atomically swappable pointer to the current registry snapshot.
pub struct RegistryHandle {
    current: ArcSwap<BundleRegistry>,
}

impl RegistryHandle {
    pub fn new(registry: Arc<BundleRegistry>) -> Self {
        Self {
            current: ArcSwap::new(registry),
        }
    }

    /// The snapshot to resolve against. Callers hold it for the whole
    /// page render so a concurrent publish cannot shear their ordering.
    #[inline]
    pub fn current(&self) -> Arc<BundleRegistry> {
        self.current.load_full()
    }

    /// Swap in a freshly built snapshot. In-flight resolutions are
    /// unaffected.
    pub fn publish(&self, registry: Arc<BundleRegistry>) {
        self.current.store(registry);
    }
}

// ============================================================================
// Render pass
// ============================================================================

/// Per-page deduplication state.
///
/// One pass lives for one page render; every bundle id contributes its
/// paths at most once no matter how many resolutions mention it.
#[derive(Default)]
pub struct RenderPass {
    included: FxHashSet<String>,
}

impl RenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_included(&self, bundle_id: &str) -> bool {
        self.included.contains(bundle_id)
    }

    /// Mark a bundle as rendered. Returns false when it already was.
    #[inline]
    pub fn mark(&mut self, bundle_id: &str) -> bool {
        self.included.insert(bundle_id.to_string())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// One element of a resolution result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedItem {
    /// Marks the start of one bundle's contribution, carrying its id.
    /// Emitted in debug mode so callers can render human-readable
    /// separators between the member groups.
    BundleStart(String),
    /// An include path.
    Path(String),
}

impl ResolvedItem {
    /// The include path, if this item is one.
    #[inline]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            ResolvedItem::Path(path) => Some(path),
            ResolvedItem::BundleStart(_) => None,
        }
    }
}

/// Resolve a bundle id into the ordered include list for the current
/// page.
///
/// In debug mode each member is emitted as its own path, preceded by a
/// [`ResolvedItem::BundleStart`] marker per contributing bundle; in
/// production one token-prefixed artifact path per bundle, no markers.
/// Both modes share the ordering protocol: active globals first,
/// dependencies next, the requested bundle last.
pub fn resolve(
    registry: &BundleRegistry,
    bundle_id: &str,
    requested: &VariantPoint,
    pass: &mut RenderPass,
) -> Result<Vec<ResolvedItem>, EngineError> {
    let bundle = registry
        .get(bundle_id)
        .ok_or_else(|| EngineError::NotFound(bundle_id.to_string()))?;

    let mut items = Vec::new();

    for global in registry.globals() {
        render_bundle(registry, global, requested, pass, &mut items);
    }

    for dep_id in bundle.dependencies() {
        let dep = registry
            .get(dep_id)
            .ok_or_else(|| EngineError::UnknownBundle(dep_id.clone()))?;
        render_bundle(registry, dep, requested, pass, &mut items);
    }

    render_bundle(registry, bundle, requested, pass, &mut items);
    Ok(items)
}

fn render_bundle(
    registry: &BundleRegistry,
    bundle: &Bundle,
    requested: &VariantPoint,
    pass: &mut RenderPass,
    items: &mut Vec<ResolvedItem>,
) {
    if !pass.mark(&bundle.id) {
        return;
    }
    if !bundle.inclusion.is_active(registry.mode.is_debug()) {
        return;
    }

    if registry.mode.is_debug() {
        items.push(ResolvedItem::BundleStart(bundle.id.clone()));
        items.extend(
            bundle
                .item_paths
                .iter()
                .map(|path| ResolvedItem::Path(path.clone())),
        );
        return;
    }

    if let Some(alternate) = &bundle.alternate_production_url {
        items.push(ResolvedItem::Path(alternate.clone()));
        return;
    }

    if bundle.variants.is_empty() {
        let token = bundle.hash_token(None);
        items.push(ResolvedItem::Path(format!("/{token}/{}", bundle.name)));
        return;
    }

    let point = registry.resolver.resolve_point(&bundle.variants, requested);
    let key = variant::variant_key(&point);
    let token = bundle.hash_token(Some(&key));
    items.push(ResolvedItem::Path(format!(
        "/{token}/{}",
        variant::variant_bundle_name(&bundle.name, &key)
    )));
}
