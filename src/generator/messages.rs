//! Message-bundle generator: turns `.properties` files into a script that
//! publishes the messages as a namespaced JavaScript object.
//!
//! A mapping of `messages:app/errors` reads `/app/errors.properties` and,
//! when the build variant selects a locale, overlays
//! `/app/errors_<locale>.properties` on top of the base keys. The
//! available locales are discovered from sibling files, which makes this
//! generator locale-aware: the registry folds the discovered keys into the
//! bundle's `locale` variant axis.

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::reader::ResourceReader;

use super::{GeneratorContext, PREFIX_SEPARATOR, ResourceGenerator};

const PROPERTIES_EXTENSION: &str = ".properties";

pub struct MessagesGenerator {
    namespace: String,
}

impl MessagesGenerator {
    pub fn new() -> Self {
        Self {
            namespace: "messages".to_string(),
        }
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Base resource path for a generated path: `messages:app/errors`
    /// becomes `/app/errors`.
    fn base_path(path: &str) -> String {
        let suffix = match path.find(PREFIX_SEPARATOR) {
            Some(idx) => &path[idx + 1..],
            None => path,
        };
        format!("/{}", suffix.trim_start_matches('/'))
    }

    fn read_properties(
        reader: &dyn ResourceReader,
        path: &str,
        into: &mut BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        let content = reader.get_resource(path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                into.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(())
    }

    fn render_script(&self, entries: &BTreeMap<String, String>) -> String {
        let mut script = String::new();
        script.push_str(&format!(
            "if(typeof {ns}==='undefined'){{var {ns}={{}};}}\n",
            ns = self.namespace
        ));
        for (key, value) in entries {
            let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
            script.push_str(&format!("{}['{}']='{}';\n", self.namespace, key, escaped));
        }
        script
    }
}

impl Default for MessagesGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGenerator for MessagesGenerator {
    fn create_resource(&self, ctx: &GeneratorContext) -> Result<String, EngineError> {
        let base = Self::base_path(ctx.path);
        let mut entries = BTreeMap::new();

        Self::read_properties(ctx.reader, &format!("{base}{PROPERTIES_EXTENSION}"), &mut entries)?;

        // Locale overlay wins over base keys
        if let Some(locale) = ctx
            .variant
            .and_then(|v| v.get("locale"))
            .filter(|l| !l.is_empty())
        {
            let localized = format!("{base}_{locale}{PROPERTIES_EXTENSION}");
            match Self::read_properties(ctx.reader, &localized, &mut entries) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(self.render_script(&entries))
    }

    fn available_locales(&self, path: &str, reader: &dyn ResourceReader) -> Option<Vec<String>> {
        let base = Self::base_path(path);
        let (dir, stem) = base.rsplit_once('/')?;
        let dir = if dir.is_empty() { "/" } else { dir };

        let marker = format!("{stem}_");
        let locales: Vec<String> = reader
            .get_resource_names(dir)
            .into_iter()
            .filter_map(|name| {
                let rest = name.strip_prefix(&marker)?;
                let locale = rest.strip_suffix(PROPERTIES_EXTENSION)?;
                (!locale.is_empty()).then(|| locale.to_string())
            })
            .collect();

        (!locales.is_empty()).then_some(locales)
    }
}
