//! TOML configuration: engine settings plus the bundle definition list.
//!
//! Validation is collected, not fail-fast: `validate` walks the whole
//! file and reports every problem at once, so a bad configuration is
//! fixed in one edit instead of one error per run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::bundle::variant::{VariantMap, VariantSet};

fn default_charset() -> String {
    "UTF-8".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Debug mode serves members individually; production serves
    /// assembled bundles.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Opaque prefix prepended to every production include path.
    #[serde(default)]
    pub url_prefix: String,
    /// Directory resolved resource paths are read from.
    pub resource_root: PathBuf,
    /// Directory assembled bundles and the token mapping are stored in.
    pub store_root: PathBuf,
    /// Processor names applied per member for bundles that declare none.
    pub default_unit_processor: Option<String>,
    /// Processor names applied to joined content for bundles that
    /// declare none.
    pub default_bundle_processor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Unique human-readable identifier; the production file segment.
    pub name: String,
    /// Unique normalized path; the debug request path.
    pub id: String,
    /// Member type suffix. Defaults to the id's extension.
    pub extension: Option<String>,
    /// Path mappings expanded into the member list. Simple bundles only.
    #[serde(default)]
    pub mappings: Vec<String>,
    /// Child bundle names. Presence makes this a composite.
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub global: bool,
    /// Sort key among globals, lower first.
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub debug_only: bool,
    #[serde(default)]
    pub production_only: bool,
    /// Declared variant axes, keyed by axis name.
    #[serde(default)]
    pub variants: BTreeMap<String, VariantConfig>,
    /// Names of bundles this one must be assembled after.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Comma-separated processor names applied per member.
    pub unit_processor: Option<String>,
    /// Comma-separated processor names applied to the joined content.
    pub bundle_processor: Option<String>,
    /// Serve this URL instead of the stored bundle in production.
    pub alternate_production_url: Option<String>,
    /// Conditional-comment expression passed through to the renderer.
    pub ie_expression: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantConfig {
    #[serde(default)]
    pub default: String,
    pub keys: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration at {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Collect every configuration problem in one pass. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut names: Vec<&str> = Vec::new();
        let mut ids: Vec<&str> = Vec::new();
        for bundle in &self.bundles {
            if names.contains(&bundle.name.as_str()) {
                problems.push(format!("duplicate bundle name [{}]", bundle.name));
            }
            names.push(&bundle.name);
            if ids.contains(&bundle.id.as_str()) {
                problems.push(format!("duplicate bundle id [{}]", bundle.id));
            }
            ids.push(&bundle.id);
        }

        let mut claimed_children: Vec<&str> = Vec::new();
        for bundle in &self.bundles {
            if bundle.debug_only && bundle.production_only {
                problems.push(format!(
                    "bundle [{}] is both debug_only and production_only",
                    bundle.name
                ));
            }

            if bundle.is_composite() {
                if !bundle.mappings.is_empty() {
                    problems.push(format!(
                        "composite bundle [{}] cannot declare mappings",
                        bundle.name
                    ));
                }
                if !bundle.variants.is_empty() {
                    problems.push(format!(
                        "composite bundle [{}] derives variants from its children, \
                         direct variant declaration is not allowed",
                        bundle.name
                    ));
                }
                for child in &bundle.children {
                    if child == &bundle.name {
                        problems.push(format!("bundle [{}] lists itself as a child", bundle.name));
                    } else if !names.contains(&child.as_str()) {
                        problems.push(format!(
                            "bundle [{}] lists unknown child [{child}]",
                            bundle.name
                        ));
                    } else if self
                        .bundles
                        .iter()
                        .any(|b| &b.name == child && b.is_composite())
                    {
                        problems.push(format!(
                            "bundle [{}] lists composite [{child}] as a child, \
                             children must be simple bundles",
                            bundle.name
                        ));
                    } else if claimed_children.contains(&child.as_str()) {
                        problems.push(format!(
                            "bundle [{child}] is a child of more than one composite"
                        ));
                    } else {
                        claimed_children.push(child);
                    }
                }
            }

            for dep in &bundle.dependencies {
                if !names.contains(&dep.as_str()) {
                    problems.push(format!(
                        "bundle [{}] depends on unknown bundle [{dep}]",
                        bundle.name
                    ));
                }
            }

            for (axis, variant) in &bundle.variants {
                if variant.keys.is_empty() {
                    problems.push(format!(
                        "bundle [{}] variant axis '{axis}' declares no keys",
                        bundle.name
                    ));
                } else if !variant.keys.contains(&variant.default) {
                    problems.push(format!(
                        "bundle [{}] variant axis '{axis}' default '{}' is not a declared key",
                        bundle.name, variant.default
                    ));
                }
            }
        }

        problems
    }
}

impl BundleConfig {
    #[inline]
    pub fn is_composite(&self) -> bool {
        !self.children.is_empty()
    }

    /// The effective file extension, dot included.
    pub fn file_extension(&self) -> String {
        if let Some(extension) = &self.extension {
            if extension.starts_with('.') {
                return extension.clone();
            }
            return format!(".{extension}");
        }
        match self.id.rfind('.') {
            Some(idx) => self.id[idx..].to_string(),
            None => String::new(),
        }
    }

    /// The declared variant axes as the bundle model's map.
    pub fn variant_map(&self) -> VariantMap {
        self.variants
            .iter()
            .map(|(axis, variant)| {
                (
                    axis.clone(),
                    VariantSet::new(axis.clone(), variant.default.clone(), variant.keys.clone()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [engine]
        resource_root = "web"
        store_root = "target/bundles"

        [[bundle]]
        name = "app.js"
        id = "/js/app.js"
        mappings = ["/js/app/**"]
    "#;

    #[test]
    fn test_minimal_config_parses() {
        let config = Config::parse(MINIMAL).unwrap();
        assert!(!config.engine.debug);
        assert_eq!(config.engine.charset, "UTF-8");
        assert_eq!(config.bundles.len(), 1);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_extension_derived_from_id() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.bundles[0].file_extension(), ".js");
    }

    #[test]
    fn test_explicit_extension_normalized() {
        let mut config = Config::parse(MINIMAL).unwrap();
        config.bundles[0].extension = Some("css".into());
        assert_eq!(config.bundles[0].file_extension(), ".css");
    }

    #[test]
    fn test_duplicate_ids_reported() {
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "a.js"
            id = "/js/x.js"

            [[bundle]]
            name = "b.js"
            id = "/js/x.js"
        "#,
        )
        .unwrap();
        let problems = config.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("duplicate bundle id"));
    }

    #[test]
    fn test_conflicting_mode_flags_reported() {
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "a.js"
            id = "/js/a.js"
            debug_only = true
            production_only = true
        "#,
        )
        .unwrap();
        assert!(config.validate()[0].contains("both debug_only and production_only"));
    }

    #[test]
    fn test_composite_rules() {
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "lib.js"
            id = "/js/lib.js"

            [[bundle]]
            name = "all.js"
            id = "/js/all.js"
            children = ["lib.js", "ghost.js"]
            mappings = ["/js/extra.js"]
        "#,
        )
        .unwrap();
        let problems = config.validate();
        assert!(problems.iter().any(|p| p.contains("cannot declare mappings")));
        assert!(problems.iter().any(|p| p.contains("unknown child [ghost.js]")));
    }

    #[test]
    fn test_variant_default_must_be_declared() {
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "a.js"
            id = "/js/a.js"

            [bundle.variants.skin]
            default = "neon"
            keys = ["summer", "winter"]
        "#,
        )
        .unwrap();
        assert!(config.validate()[0].contains("'neon' is not a declared key"));
    }

    #[test]
    fn test_variant_map_conversion() {
        let config = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"

            [[bundle]]
            name = "a.css"
            id = "/css/a.css"

            [bundle.variants.skin]
            default = "summer"
            keys = ["summer", "winter"]
        "#,
        )
        .unwrap();
        let map = config.bundles[0].variant_map();
        assert_eq!(map["skin"].default_key, "summer");
        assert_eq!(map["skin"].keys, vec!["summer", "winter"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = Config::parse(
            r#"
            [engine]
            resource_root = "web"
            store_root = "out"
            turbo = true
        "#,
        );
        assert!(result.is_err());
    }
}
