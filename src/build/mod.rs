//! The build pass: configuration to published registry.
//!
//! Construction expands every bundle definition (mappings, variants,
//! processors, dependencies) into the immutable bundle set. In
//! production mode the pass then assembles every (bundle, variant) pair
//! in parallel, stores both artifact forms, computes the cache-busting
//! tokens and persists the token mapping. Debug mode stops after
//! construction, since members are served individually.

pub mod assemble;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, bail};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::bundle::{Bundle, InclusionPattern, dependency, mapping, variant};
use crate::config::{BundleConfig, Config, EngineConfig};
use crate::core::ResolveMode;
use crate::error::EngineError;
use crate::processor;
use crate::reader::ReaderHandler;
use crate::resolve::BundleRegistry;
use crate::store::BundleStore;
use crate::utils::hash;
use crate::{debug, log};

/// Outcome of a completed build pass.
#[derive(Debug)]
pub struct BuildReport {
    pub registry: Arc<BundleRegistry>,
    /// Non-fatal problems encountered along the way.
    pub warnings: Vec<String>,
}

/// Run a full build pass against the given configuration.
pub fn run_build(
    config: &Config,
    handler: &ReaderHandler,
    store: &dyn BundleStore,
) -> anyhow::Result<BuildReport> {
    let mode = ResolveMode::from_debug_flag(config.engine.debug);
    let (bundles, mut warnings) = construct_bundles(config, handler)?;

    if !mode.is_debug() {
        let collected: Vec<Vec<String>> = bundles
            .par_iter()
            .filter(|bundle| bundle.inclusion.is_active(false))
            .map(|bundle| assemble_and_store(bundle, handler, store, &config.engine.charset))
            .collect::<Result<_, EngineError>>()?;
        for batch in collected {
            warnings.extend(batch);
        }
        store.store_mapping(&token_mapping(&bundles))?;
    }

    let registry = Arc::new(BundleRegistry::new(bundles, mode)?);
    log!(
        "build";
        "built {} bundles in {} mode ({} warnings)",
        registry.bundles().len(),
        if mode.is_debug() { "debug" } else { "production" },
        warnings.len()
    );
    Ok(BuildReport { registry, warnings })
}

/// Rebuild the registry from the persisted token mapping, assembling
/// nothing.
///
/// This is the request path after a restart: production serves the
/// artifacts and tokens a previous [`run_build`] stored, so construction
/// alone is enough. Fails with a NotFound when no mapping was ever
/// persisted, or when an active bundle has no entry in it (the mapping
/// is stale and a rebuild is due). Debug mode needs no tokens and skips
/// the mapping entirely.
pub fn load_registry(
    config: &Config,
    handler: &ReaderHandler,
    store: &dyn BundleStore,
) -> anyhow::Result<BuildReport> {
    let mode = ResolveMode::from_debug_flag(config.engine.debug);
    let (bundles, warnings) = construct_bundles(config, handler)?;

    if !mode.is_debug() {
        let mapping = store
            .load_mapping()?
            .ok_or_else(|| EngineError::NotFound("bundle token mapping".to_string()))?;
        for bundle in bundles.iter().filter(|b| b.inclusion.is_active(false)) {
            restore_tokens(bundle, &mapping)?;
        }
        debug!("resolve"; "restored {} token entries", mapping.len());
    }

    let registry = Arc::new(BundleRegistry::new(bundles, mode)?);
    Ok(BuildReport { registry, warnings })
}

/// Reinstall a bundle's per-variant tokens from the persisted mapping.
fn restore_tokens(
    bundle: &Bundle,
    mapping: &BTreeMap<String, String>,
) -> Result<(), EngineError> {
    let keys = bundle.variant_keys();
    if keys.is_empty() {
        let token = mapping
            .get(&bundle.id)
            .ok_or_else(|| EngineError::NotFound(bundle.id.clone()))?;
        bundle.restore_token(None, token.clone());
        return Ok(());
    }
    for key in keys {
        let entry = format!("{}@{key}", bundle.id);
        let token = mapping
            .get(&entry)
            .ok_or_else(|| EngineError::NotFound(entry.clone()))?;
        bundle.restore_token(Some(&key), token.clone());
    }
    Ok(())
}

// ============================================================================
// Construction
// ============================================================================

/// Expand every bundle definition into the immutable bundle set, with
/// dependencies resolved.
pub fn construct_bundles(
    config: &Config,
    handler: &ReaderHandler,
) -> anyhow::Result<(Vec<Arc<Bundle>>, Vec<String>)> {
    let problems = config.validate();
    if !problems.is_empty() {
        bail!("invalid configuration:\n  {}", problems.join("\n  "));
    }

    let debug_on = config.engine.debug;
    let mut warnings = Vec::new();

    // Simple bundles first, so composites can consume them whole
    let mut slots: Vec<Option<Bundle>> = Vec::new();
    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    for cfg in config.bundles.iter().filter(|c| !c.is_composite()) {
        index.insert(&cfg.name, slots.len());
        slots.push(Some(build_simple(cfg, &config.engine, handler, &mut warnings)?));
    }

    let mut composites: FxHashMap<&str, Bundle> = FxHashMap::default();
    for cfg in config.bundles.iter().filter(|c| c.is_composite()) {
        let children: Vec<Bundle> = cfg
            .children
            .iter()
            .filter_map(|name| index.get(name.as_str()))
            .filter_map(|&slot| slots[slot].take())
            .collect();

        let unitary = cfg
            .unit_processor
            .as_deref()
            .or(config.engine.default_unit_processor.as_deref())
            .map(processor::build_chain)
            .transpose()?;
        let bundle_level = cfg
            .bundle_processor
            .as_deref()
            .or(config.engine.default_bundle_processor.as_deref())
            .map(processor::build_chain)
            .transpose()?;

        let mut composite = Bundle::composite(
            &cfg.id,
            cfg.name.clone(),
            cfg.file_extension(),
            inclusion_of(cfg),
            children,
            debug_on,
            unitary,
            bundle_level,
        )
        .with_context(|| format!("building composite bundle [{}]", cfg.name))?;
        composite.declared_dependencies = cfg.dependencies.clone();
        composite.alternate_production_url = cfg.alternate_production_url.clone();
        composite.explorer_conditional_expression = cfg.ie_expression.clone();
        composites.insert(&cfg.name, composite);
    }

    // Final set in declaration order; consumed children are inside their
    // composite and do not appear at the top level
    let mut bundles: Vec<Arc<Bundle>> = Vec::new();
    for cfg in &config.bundles {
        let bundle = if cfg.is_composite() {
            composites.remove(cfg.name.as_str())
        } else {
            index.get(cfg.name.as_str()).and_then(|&slot| slots[slot].take())
        };
        if let Some(bundle) = bundle {
            bundles.push(Arc::new(bundle));
        }
    }

    dependency::resolve_dependencies(&bundles)?;
    Ok((bundles, warnings))
}

fn inclusion_of(cfg: &BundleConfig) -> InclusionPattern {
    let mut pattern = if cfg.global {
        InclusionPattern::global(cfg.order)
    } else {
        InclusionPattern::context()
    };
    if cfg.debug_only {
        pattern = pattern.debug_only();
    }
    if cfg.production_only {
        pattern = pattern.production_only();
    }
    pattern
}

fn build_simple(
    cfg: &BundleConfig,
    engine: &EngineConfig,
    handler: &ReaderHandler,
    warnings: &mut Vec<String>,
) -> anyhow::Result<Bundle> {
    let extension = cfg.file_extension();
    let mut resolved =
        mapping::resolve_path_mappings(&cfg.name, &extension, &cfg.mappings, handler)?;
    warnings.append(&mut resolved.warnings);

    let mut bundle = Bundle::simple(
        &cfg.id,
        cfg.name.clone(),
        extension,
        inclusion_of(cfg),
        resolved,
    );
    bundle.declared_dependencies = cfg.dependencies.clone();
    bundle.alternate_production_url = cfg.alternate_production_url.clone();
    bundle.explorer_conditional_expression = cfg.ie_expression.clone();

    // Declared axes plus whatever the generated members contribute
    let mut variants = cfg.variant_map();
    for item in &bundle.item_paths {
        if let Some(contributed) = handler.variants_for(item) {
            variants = variant::union_variants(&variants, &contributed)
                .with_context(|| format!("merging generator variants into bundle [{}]", cfg.name))?;
        }
    }
    bundle.variants = variants;

    // Engine-wide defaults only fill the gaps
    if let Some(names) = cfg
        .unit_processor
        .as_deref()
        .or(engine.default_unit_processor.as_deref())
    {
        bundle.unitary_processor = Some(processor::build_chain(names)?);
    }
    if let Some(names) = cfg
        .bundle_processor
        .as_deref()
        .or(engine.default_bundle_processor.as_deref())
    {
        bundle.bundle_processor = Some(processor::build_chain(names)?);
    }
    Ok(bundle)
}

// ============================================================================
// Assembly and persistence
// ============================================================================

fn assemble_and_store(
    bundle: &Bundle,
    handler: &ReaderHandler,
    store: &dyn BundleStore,
    charset: &str,
) -> Result<Vec<String>, EngineError> {
    let mut warnings = Vec::new();
    for build in assemble::assemble_variants(bundle, handler, charset)? {
        bundle.set_hash_token(build.variant_key.as_deref(), hash::bundle_hash(&build.content));
        store.store_bundle(&build.stored_name, &build.content)?;
        debug!("build"; "stored [{}] ({} bytes)", build.stored_name, build.content.len());
        warnings.extend(build.warnings);
    }
    Ok(warnings)
}

/// Flatten every bundle's tokens into the persisted mapping, keyed by
/// bundle id with the variant key appended after `@`.
fn token_mapping(bundles: &[Arc<Bundle>]) -> BTreeMap<String, String> {
    let mut mapping = BTreeMap::new();
    for bundle in bundles {
        for (key, token) in bundle.token_entries() {
            let entry = match key {
                Some(key) => format!("{}@{key}", bundle.id),
                None => bundle.id.clone(),
            };
            mapping.insert(entry, token);
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::variant::VariantPoint;
    use crate::generator::GeneratorRegistry;
    use crate::reader::FsResourceReader;
    use crate::resolve::{RenderPass, ResolvedItem, resolve};
    use crate::store::FsBundleStore;
    use std::fs;
    use tempfile::TempDir;

    fn paths(items: &[ResolvedItem]) -> Vec<&str> {
        items.iter().filter_map(ResolvedItem::as_path).collect()
    }

    fn fixture() -> (TempDir, TempDir, ReaderHandler, FsBundleStore) {
        let web = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let js = web.path().join("js");
        fs::create_dir_all(js.join("app")).unwrap();
        fs::create_dir_all(js.join("lib")).unwrap();
        fs::write(js.join("app/main.js"), "var main;").unwrap();
        fs::write(js.join("lib/util.js"), "var util;").unwrap();

        let handler = ReaderHandler::new(
            FsResourceReader::new(web.path()),
            Arc::new(GeneratorRegistry::with_defaults()),
            "UTF-8".into(),
        );
        let store = FsBundleStore::new(out.path());
        (web, out, handler, store)
    }

    fn config(debug: bool) -> Config {
        Config::parse(&format!(
            r#"
            [engine]
            debug = {debug}
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "lib.js"
            id = "/js/lib.js"
            mappings = ["/js/lib/**"]

            [[bundle]]
            name = "app.js"
            id = "/js/app.js"
            mappings = ["/js/app/**"]
            dependencies = ["lib.js"]
        "#
        ))
        .unwrap()
    }

    #[test]
    fn test_production_build_stores_and_tokenizes() {
        let (_web, _out, handler, store) = fixture();
        let report = run_build(&config(false), &handler, &store).unwrap();

        assert_eq!(store.read_bundle("app.js").unwrap(), "var main;");
        assert_eq!(store.read_bundle("lib.js").unwrap(), "var util;");

        let mapping = store.load_mapping().unwrap().unwrap();
        let token = &mapping["/js/app.js"];

        let mut pass = RenderPass::new();
        let items = resolve(
            &report.registry,
            "/js/app.js",
            &VariantPoint::new(),
            &mut pass,
        )
        .unwrap();
        // Dependency first, then the requested bundle under its token
        let resolved = paths(&items);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1], format!("/{token}/app.js"));
    }

    #[test]
    fn test_resolve_from_persisted_mapping_without_reassembly() {
        let (web, _out, handler, store) = fixture();
        let cfg = config(false);
        run_build(&cfg, &handler, &store).unwrap();
        let mapping = store.load_mapping().unwrap().unwrap();
        let token = &mapping["/js/app.js"];

        // A restarted process with the sources gone: the stored artifacts
        // and mapping are all production needs
        fs::remove_file(web.path().join("js/app/main.js")).unwrap();
        fs::remove_file(web.path().join("js/lib/util.js")).unwrap();

        let report = load_registry(&cfg, &handler, &store).unwrap();
        let mut pass = RenderPass::new();
        let items = resolve(
            &report.registry,
            "/js/app.js",
            &VariantPoint::new(),
            &mut pass,
        )
        .unwrap();
        assert_eq!(paths(&items).last(), Some(&format!("/{token}/app.js").as_str()));
    }

    #[test]
    fn test_load_registry_without_prior_build_is_not_found() {
        let (_web, _out, handler, store) = fixture();
        let err = load_registry(&config(false), &handler, &store).unwrap_err();
        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(engine_err.is_not_found());
    }

    #[test]
    fn test_debug_build_skips_assembly() {
        let (_web, _out, handler, store) = fixture();
        let report = run_build(&config(true), &handler, &store).unwrap();

        assert!(store.read_bundle("app.js").unwrap_err().is_not_found());
        assert!(store.load_mapping().unwrap().is_none());

        let mut pass = RenderPass::new();
        let items = resolve(
            &report.registry,
            "/js/app.js",
            &VariantPoint::new(),
            &mut pass,
        )
        .unwrap();
        assert_eq!(paths(&items), vec!["/js/lib/util.js", "/js/app/main.js"]);
    }

    #[test]
    fn test_composite_children_absorbed() {
        let (_web, _out, handler, store) = fixture();
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "lib.js"
            id = "/js/lib.js"
            mappings = ["/js/lib/**"]

            [[bundle]]
            name = "app.js"
            id = "/js/app.js"
            mappings = ["/js/app/**"]

            [[bundle]]
            name = "all.js"
            id = "/js/all.js"
            children = ["lib.js", "app.js"]
        "#,
        )
        .unwrap();

        let report = run_build(&config, &handler, &store).unwrap();
        // Children live inside the composite, not at the top level
        assert_eq!(report.registry.bundles().len(), 1);
        assert_eq!(store.read_bundle("all.js").unwrap(), "var util;\nvar main;");
    }

    #[test]
    fn test_engine_default_processor_fills_gaps() {
        let (_web, _out, handler, store) = fixture();
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"
            default_bundle_processor = "trim"

            [[bundle]]
            name = "app.js"
            id = "/js/app.js"
            mappings = ["/js/app/**"]
        "#,
        )
        .unwrap();

        run_build(&config, &handler, &store).unwrap();
        // The default trim ran at the bundle level
        assert_eq!(store.read_bundle("app.js").unwrap(), "var main;\n");
    }

    #[test]
    fn test_invalid_configuration_fails_whole_pass() {
        let (_web, _out, handler, store) = fixture();
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "a.js"
            id = "/js/dup.js"

            [[bundle]]
            name = "b.js"
            id = "/js/dup.js"
        "#,
        )
        .unwrap();

        let err = run_build(&config, &handler, &store).unwrap_err();
        assert!(err.to_string().contains("invalid configuration"));
    }

    #[test]
    fn test_locale_variants_built_per_point() {
        let web = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::create_dir_all(web.path().join("i18n")).unwrap();
        fs::write(web.path().join("i18n/app.properties"), "hi=hello\n").unwrap();
        fs::write(web.path().join("i18n/app_fr.properties"), "hi=salut\n").unwrap();

        let handler = ReaderHandler::new(
            FsResourceReader::new(web.path()),
            Arc::new(GeneratorRegistry::with_defaults()),
            "UTF-8".into(),
        );
        let store = FsBundleStore::new(out.path());
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "msgs.js"
            id = "/js/msgs.js"
            mappings = ["messages:i18n/app"]
        "#,
        )
        .unwrap();

        run_build(&config, &handler, &store).unwrap();

        // The generator contributed a locale axis: one build per key
        assert!(store.read_bundle("msgs.js").unwrap().contains("'hello'"));
        assert!(store.read_bundle("msgs@fr.js").unwrap().contains("'salut'"));

        let mapping = store.load_mapping().unwrap().unwrap();
        assert!(mapping.contains_key("/js/msgs.js@"));
        assert!(mapping.contains_key("/js/msgs.js@fr"));

        // A fresh registry restores every variant token from the mapping
        let report = load_registry(&config, &handler, &store).unwrap();
        let mut requested = VariantPoint::new();
        requested.insert("locale".into(), "fr".into());
        let mut pass = RenderPass::new();
        let items = resolve(&report.registry, "/js/msgs.js", &requested, &mut pass).unwrap();
        let token = &mapping["/js/msgs.js@fr"];
        assert_eq!(paths(&items), vec![format!("/{token}/msgs@fr.js").as_str()]);
    }
}
