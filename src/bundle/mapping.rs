//! Path mapping resolver: expands declared mapping strings into the
//! ordered member list of a bundle.
//!
//! Mapping rules, applied in declared order:
//! - `dir/` includes direct children matching the bundle extension
//! - `dir/**` includes children recursively, same-level files before
//!   subfolders, unless a `.sorting` file overrides the order
//! - a path ending with the bundle extension is a single resource
//! - a path matching a generator prefix is added verbatim
//! - a path ending with `.license` feeds the license set
//! - anything else records a configuration warning and is skipped

use std::collections::BTreeSet;

use crate::core::path::{as_path, join_generated, join_paths};
use crate::error::EngineError;
use crate::log;
use crate::reader::{ReaderHandler, ResourceReader};

/// Reserved filename overriding member order inside a directory.
pub const SORT_FILE_NAME: &str = ".sorting";

/// Reserved filename collected into the license set.
pub const LICENSES_FILE_NAME: &str = ".license";

/// Outcome of expanding a bundle's path mappings.
#[derive(Debug, Default)]
pub struct ResolvedMappings {
    /// Ordered member paths; insertion order is the concatenation order.
    pub items: Vec<String>,
    /// License file paths collected alongside members.
    pub licenses: BTreeSet<String>,
    /// Non-fatal configuration warnings (bad mappings, dangling sort entries).
    pub warnings: Vec<String>,
}

/// Expand the declared path mappings of one bundle.
///
/// Unexpected I/O while reading a sort file is fatal; everything else
/// that can go wrong here is a recoverable warning.
pub fn resolve_path_mappings(
    bundle_name: &str,
    file_extension: &str,
    mappings: &[String],
    handler: &ReaderHandler,
) -> Result<ResolvedMappings, EngineError> {
    let mut resolved = ResolvedMappings::default();

    for mapping in mappings {
        if let Some(dir) = mapping.strip_suffix("/**") {
            add_items_from_dir(&mut resolved, dir, true, file_extension, handler)?;
        } else if mapping.ends_with('/') {
            add_items_from_dir(&mut resolved, mapping, false, file_extension, handler)?;
        } else if handler.is_generated(mapping) {
            resolved.items.push(mapping.clone());
        } else if mapping.ends_with(file_extension) {
            resolved.items.push(as_path(mapping));
        } else if mapping.ends_with(LICENSES_FILE_NAME) {
            resolved.licenses.insert(as_path(mapping));
        } else {
            let warning = format!(
                "wrong mapping [{mapping}] for bundle [{bundle_name}], please check configuration"
            );
            log!("warning"; "{warning}");
            resolved.warnings.push(warning);
        }
    }

    Ok(resolved)
}

/// Join a directory path with a child name, respecting generated-path form.
fn join_dir(dir: &str, name: &str, generated: bool) -> String {
    if generated {
        join_generated(dir, name)
    } else {
        join_paths(dir, name)
    }
}

/// Add all resources within a directory to the member list.
///
/// When the directory carries a sort file, its entries come first in the
/// order it specifies (directories listed there are recursed in place);
/// remaining files follow, then remaining subfolders.
fn add_items_from_dir(
    resolved: &mut ResolvedMappings,
    dir: &str,
    recurse: bool,
    file_extension: &str,
    handler: &ReaderHandler,
) -> Result<(), EngineError> {
    let generated = handler.is_generated(dir);
    let dir = if generated {
        dir.trim_end_matches('/').to_string()
    } else {
        as_path(dir)
    };

    let mut remaining = handler.get_resource_names(&dir);

    // Sort file overrides the default file-then-subfolder order
    if remaining.remove(SORT_FILE_NAME) {
        let sort_path = join_dir(&dir, SORT_FILE_NAME, generated);
        let content = handler.get_resource(&sort_path)?;
        for name in parse_sort_file(&content) {
            if !remaining.remove(&name) {
                let warning = format!(
                    "sort file entry [{name}] does not exist in [{dir}], entry skipped"
                );
                log!("warning"; "{warning}");
                resolved.warnings.push(warning);
                continue;
            }
            let full = join_dir(&dir, &name, generated);
            if name.ends_with(file_extension) {
                resolved.items.push(full);
            } else if recurse && handler.is_directory(&full) {
                add_items_from_dir(resolved, &full, true, file_extension, handler)?;
            }
        }
    }

    // License file travels with the directory, not the member list
    if remaining.remove(LICENSES_FILE_NAME) {
        resolved
            .licenses
            .insert(join_dir(&dir, LICENSES_FILE_NAME, generated));
    }

    // Remaining files first, subfolders collected for later
    let mut folders = Vec::new();
    for name in &remaining {
        let full = join_dir(&dir, name, generated);
        if name.ends_with(file_extension) {
            resolved.items.push(full);
        } else if recurse && handler.is_directory(&full) {
            folders.push(full);
        }
    }

    // Subfolders last, unless the sort file already placed them
    if recurse {
        for folder in folders {
            add_items_from_dir(resolved, &folder, true, file_extension, handler)?;
        }
    }

    Ok(())
}

/// Parse a sort file into its ordered entry names.
///
/// One entry per line; blank lines and `#` comments are skipped.
fn parse_sort_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
