//! Content hashing for cache busting.
//!
//! Uses `rustc_hash::FxHasher` for fast, deterministic hashing. The
//! cache-busting token is derived from a 32-bit truncation of the hash;
//! since the token is used as a URL path segment, the minus sign of a
//! negative value is rendered as a literal `N`.

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute the 32-bit bundle content hash.
///
/// A pure function of the content: unchanged content yields an unchanged
/// value, and any byte change yields a different value for all practical
/// purposes.
#[inline]
#[allow(clippy::cast_possible_truncation)] // 32 bits is the token width
pub fn bundle_hash(content: &str) -> i32 {
    compute(content) as i32
}

/// Encode a 32-bit hash as a URL-safe token.
///
/// Non-negative values render as decimal digits; negative values render
/// as `N` followed by the absolute value's digits, so the token never
/// contains a `-`.
pub fn hash_token(hash: i32) -> String {
    if hash < 0 {
        format!("N{}", hash.unsigned_abs())
    } else {
        hash.to_string()
    }
}
