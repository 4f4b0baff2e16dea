//! Post-processors: pure content transformations applied during assembly.
//!
//! Two hook points exist. The *unitary* processor runs on each member's
//! content right after it is read; the *bundle* processor runs once on
//! the joined text. Processors are pure (`content in -> content out`)
//! and read everything else they need from [`BundleProcessingStatus`].
//! They only run in production-mode assembly.

mod minify;

pub use minify::{CssMinProcessor, JsMinProcessor};

use std::sync::Arc;

use crate::bundle::Bundle;
use crate::error::EngineError;
use crate::reader::ResourceReader;

/// Read-only context handed to every processor invocation.
pub struct BundleProcessingStatus<'a> {
    /// The bundle being assembled.
    pub bundle: &'a Bundle,
    /// The member path whose content is being processed; the bundle id
    /// itself for bundle-level invocations.
    pub last_path: &'a str,
    pub debug_on: bool,
    pub charset: &'a str,
    /// Resource access for processors that pull in side files.
    pub reader: &'a dyn ResourceReader,
}

/// A named, pure content transformation.
pub trait PostProcessor: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Transform `content`, returning the replacement text.
    fn post_process(
        &self,
        status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError>;
}

// ============================================================================
// Chain
// ============================================================================

/// Runs a list of processors in declaration order, feeding each one's
/// output into the next.
#[derive(Debug)]
pub struct ProcessorChain {
    name: String,
    links: Vec<Arc<dyn PostProcessor>>,
}

impl PostProcessor for ProcessorChain {
    fn name(&self) -> &str {
        &self.name
    }

    fn post_process(
        &self,
        status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError> {
        self.links
            .iter()
            .try_fold(content, |content, link| link.post_process(status, content))
    }
}

/// Build a processor from a comma-separated list of registered names.
///
/// A single name yields that processor directly; several yield a
/// [`ProcessorChain`]. Unknown names fail configuration.
pub fn build_chain(names: &str) -> Result<Arc<dyn PostProcessor>, EngineError> {
    let mut links: Vec<Arc<dyn PostProcessor>> = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        links.push(builtin(name)?);
    }
    match links.len() {
        0 => Err(EngineError::UnknownProcessor(names.to_string())),
        1 => Ok(links.remove(0)),
        _ => Ok(Arc::new(ProcessorChain {
            name: names.to_string(),
            links,
        })),
    }
}

fn builtin(name: &str) -> Result<Arc<dyn PostProcessor>, EngineError> {
    match name {
        "trim" => Ok(Arc::new(TrimProcessor)),
        "license-includer" => Ok(Arc::new(LicenseIncluderProcessor)),
        "jsmin" => Ok(Arc::new(JsMinProcessor)),
        "cssmin" => Ok(Arc::new(CssMinProcessor)),
        _ => Err(EngineError::UnknownProcessor(name.to_string())),
    }
}

// ============================================================================
// Built-ins
// ============================================================================

/// Strips leading and trailing whitespace, keeping a single trailing
/// newline so concatenated members never run together.
#[derive(Debug)]
pub struct TrimProcessor;

impl PostProcessor for TrimProcessor {
    fn name(&self) -> &str {
        "trim"
    }

    fn post_process(
        &self,
        _status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{trimmed}\n"))
    }
}

/// Prepends the bundle's collected license files to the joined content.
///
/// Useful as a bundle-level processor after a minifier, which would
/// otherwise strip the license comments out of the members.
#[derive(Debug)]
pub struct LicenseIncluderProcessor;

impl PostProcessor for LicenseIncluderProcessor {
    fn name(&self) -> &str {
        "license-includer"
    }

    fn post_process(
        &self,
        status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError> {
        if status.bundle.license_paths.is_empty() {
            return Ok(content);
        }
        let mut output = String::new();
        for path in &status.bundle.license_paths {
            output.push_str(status.reader.get_resource(path)?.trim_end());
            output.push('\n');
        }
        output.push_str(&content);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::InclusionPattern;
    use crate::bundle::mapping::ResolvedMappings;
    use crate::reader::FsResourceReader;
    use std::fs;
    use tempfile::TempDir;

    fn bundle_with_licenses(licenses: Vec<&str>) -> Bundle {
        Bundle::simple(
            "/js/app.js",
            "app.js",
            ".js",
            InclusionPattern::context(),
            ResolvedMappings {
                licenses: licenses.into_iter().map(str::to_string).collect(),
                ..Default::default()
            },
        )
    }

    fn status<'a>(bundle: &'a Bundle, reader: &'a FsResourceReader) -> BundleProcessingStatus<'a> {
        BundleProcessingStatus {
            bundle,
            last_path: "/js/app.js",
            debug_on: false,
            charset: "UTF-8",
            reader,
        }
    }

    #[test]
    fn test_trim() {
        let dir = TempDir::new().unwrap();
        let reader = FsResourceReader::new(dir.path());
        let bundle = bundle_with_licenses(vec![]);

        let out = TrimProcessor
            .post_process(&status(&bundle, &reader), "  \nvar a;\n\n".into())
            .unwrap();
        assert_eq!(out, "var a;\n");
    }

    #[test]
    fn test_license_includer_prepends() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/.license"), "/* (c) ACME */\n").unwrap();

        let reader = FsResourceReader::new(dir.path());
        let bundle = bundle_with_licenses(vec!["/js/.license"]);

        let out = LicenseIncluderProcessor
            .post_process(&status(&bundle, &reader), "var a;\n".into())
            .unwrap();
        assert_eq!(out, "/* (c) ACME */\nvar a;\n");
    }

    #[test]
    fn test_chain_runs_in_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/.license"), "/* L */").unwrap();

        let reader = FsResourceReader::new(dir.path());
        let bundle = bundle_with_licenses(vec!["/js/.license"]);

        // trim first, then license prepend; the license text is untouched
        let chain = build_chain("trim,license-includer").unwrap();
        let out = chain
            .post_process(&status(&bundle, &reader), "  var a;  ".into())
            .unwrap();
        assert_eq!(out, "/* L */\nvar a;\n");
    }

    #[test]
    fn test_unknown_processor_rejected() {
        let err = build_chain("trim,nope").unwrap_err();
        assert!(matches!(err, EngineError::UnknownProcessor(name) if name == "nope"));
    }

    #[test]
    fn test_single_name_is_not_wrapped() {
        let processor = build_chain("jsmin").unwrap();
        assert_eq!(processor.name(), "jsmin");
    }
}
