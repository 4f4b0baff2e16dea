//! Content assembly: reading a bundle's members in order, running the
//! post-processor hooks, and joining the result.

use crate::bundle::{Bundle, BundleKind};
use crate::bundle::variant::{self, VariantPoint};
use crate::error::EngineError;
use crate::log;
use crate::processor::BundleProcessingStatus;
use crate::reader::ReaderHandler;

/// One assembled (bundle, variant) build.
pub struct AssembledVariant {
    /// The variant key built, `None` for variant-less bundles.
    pub variant_key: Option<String>,
    /// The variant-decorated name the artifact is stored under.
    pub stored_name: String,
    pub content: String,
    pub warnings: Vec<String>,
}

/// Assemble every variant of a bundle.
///
/// A variant-less bundle yields exactly one build; otherwise one per
/// point of the bundle's variant space.
pub fn assemble_variants(
    bundle: &Bundle,
    handler: &ReaderHandler,
    charset: &str,
) -> Result<Vec<AssembledVariant>, EngineError> {
    if bundle.variants.is_empty() {
        let mut warnings = Vec::new();
        let content = assemble_point(bundle, None, handler, charset, &mut warnings)?;
        return Ok(vec![AssembledVariant {
            variant_key: None,
            stored_name: bundle.name.clone(),
            content,
            warnings,
        }]);
    }

    let mut builds = Vec::new();
    for point in variant::all_variants(&bundle.variants) {
        let mut warnings = Vec::new();
        let content = assemble_point(bundle, Some(&point), handler, charset, &mut warnings)?;
        let key = variant::variant_key(&point);
        builds.push(AssembledVariant {
            stored_name: variant::variant_bundle_name(&bundle.name, &key),
            variant_key: Some(key),
            content,
            warnings,
        });
    }
    Ok(builds)
}

/// Assemble one variant point of a bundle.
///
/// Composites assemble each visible child with the child's own
/// processors, then concatenate; the composite-level processors only
/// reach children that inherited them at construction.
fn assemble_point(
    bundle: &Bundle,
    point: Option<&VariantPoint>,
    handler: &ReaderHandler,
    charset: &str,
    warnings: &mut Vec<String>,
) -> Result<String, EngineError> {
    match &bundle.kind {
        BundleKind::Simple => assemble_members(bundle, point, handler, charset, warnings),
        BundleKind::Composite { children } => {
            let mut parts = Vec::with_capacity(children.len());
            for child in children {
                if !child.inclusion.is_active(false) {
                    continue;
                }
                parts.push(assemble_point(child, point, handler, charset, warnings)?);
            }
            Ok(parts.join("\n"))
        }
    }
}

/// Read, process and join the members of one (simple) bundle.
///
/// A missing member is skipped with a warning; any other I/O failure
/// aborts the whole build pass.
fn assemble_members(
    bundle: &Bundle,
    point: Option<&VariantPoint>,
    handler: &ReaderHandler,
    charset: &str,
    warnings: &mut Vec<String>,
) -> Result<String, EngineError> {
    let mut parts = Vec::with_capacity(bundle.item_paths.len());

    for member in &bundle.item_paths {
        let content = match handler.get_resource_variant(member, point) {
            Ok(content) => content,
            Err(err) if err.is_not_found() => {
                let warning = format!(
                    "member [{member}] of bundle [{}] not found, skipped",
                    bundle.id
                );
                log!("warning"; "{warning}");
                warnings.push(warning);
                continue;
            }
            Err(EngineError::Io(_, source)) => {
                return Err(EngineError::AssemblyIo {
                    bundle: bundle.id.clone(),
                    member: member.clone(),
                    source,
                });
            }
            Err(err) => return Err(err),
        };

        let content = match &bundle.unitary_processor {
            Some(processor) => {
                let status = BundleProcessingStatus {
                    bundle,
                    last_path: member,
                    debug_on: false,
                    charset,
                    reader: handler,
                };
                processor.post_process(&status, content)?
            }
            None => content,
        };
        parts.push(content);
    }

    let joined = parts.join("\n");
    match &bundle.bundle_processor {
        Some(processor) => {
            let status = BundleProcessingStatus {
                bundle,
                last_path: &bundle.id,
                debug_on: false,
                charset,
                reader: handler,
            };
            processor.post_process(&status, joined)
        }
        None => Ok(joined),
    }
}
