//! Resource path normalization.
//!
//! Bundle ids and member paths are normalized path-like strings: forward
//! slashes, a single leading `/`, no trailing `/`, and `%20` escapes
//! decoded to spaces. Generated-resource paths (prefix before a `:`)
//! keep their original form and are never slash-normalized.

use percent_encoding::percent_decode_str;

/// Normalize a path string into canonical `/a/b/c` form.
///
/// - backslashes become forward slashes
/// - percent escapes (`%20`) are decoded
/// - duplicate separators collapse
/// - a single leading `/` is enforced, trailing `/` removed
pub fn as_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let replaced = decoded.replace('\\', "/");

    let mut result = String::with_capacity(replaced.len() + 1);
    result.push('/');
    let mut last_was_sep = true;
    for c in replaced.chars() {
        if c == '/' {
            if !last_was_sep {
                result.push('/');
            }
            last_was_sep = true;
        } else {
            result.push(c);
            last_was_sep = false;
        }
    }
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    result
}

/// Join two path fragments into a single normalized path.
pub fn join_paths(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    as_path(&format!("{prefix}/{name}"))
}

/// Join a generated-resource path with a child name.
///
/// Generated paths keep their prefix form (`messages:bundle/errors`), so
/// no leading slash is added and the prefix part is left untouched.
pub fn join_generated(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    format!("{prefix}/{name}")
}
