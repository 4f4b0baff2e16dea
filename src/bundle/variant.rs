//! Variant axes: named sets of keys a bundle is built once per combination of.
//!
//! A bundle's variants map axis names (locale, skin, ...) to a
//! [`VariantSet`]. The full variant space is the Cartesian product of the
//! axes' key lists; each point gets its own build and cache-busting token.
//! Axes are kept in a `BTreeMap` so every derived ordering (cross product,
//! variant key) is stable by axis name.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::error::EngineError;

/// Separates axis values inside a variant key, and the bundle name from
/// its variant decoration (`bundle@fr@summer.js`).
pub const VARIANT_SEPARATOR: char = '@';

/// One selected key per axis.
pub type VariantPoint = BTreeMap<String, String>;

/// Axis name to declared key set.
pub type VariantMap = BTreeMap<String, VariantSet>;

/// The enumerated keys of one variant axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSet {
    /// Axis name (e.g. `locale`, `skin`).
    pub axis: String,
    /// Key used when a request does not select this axis. An empty string
    /// means "no variant".
    pub default_key: String,
    /// All valid keys, in declaration order.
    pub keys: Vec<String>,
}

impl VariantSet {
    pub fn new(
        axis: impl Into<String>,
        default_key: impl Into<String>,
        keys: Vec<String>,
    ) -> Self {
        Self {
            axis: axis.into(),
            default_key: default_key.into(),
            keys,
        }
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    #[inline]
    pub fn has_same_default(&self, other: &VariantSet) -> bool {
        self.default_key == other.default_key
    }
}

// ============================================================================
// Cross product
// ============================================================================

/// Enumerate the full variant space of a bundle: one [`VariantPoint`] per
/// combination of keys across all axes, in axis-name order.
pub fn all_variants(variants: &VariantMap) -> Vec<VariantPoint> {
    let mut points: Vec<VariantPoint> = Vec::new();
    for (axis, set) in variants {
        if points.is_empty() {
            points = set
                .keys
                .iter()
                .map(|key| {
                    let mut point = VariantPoint::new();
                    point.insert(axis.clone(), key.clone());
                    point
                })
                .collect();
        } else {
            let mut expanded = Vec::with_capacity(points.len() * set.keys.len());
            for point in &points {
                for key in &set.keys {
                    let mut next = point.clone();
                    next.insert(axis.clone(), key.clone());
                    expanded.push(next);
                }
            }
            points = expanded;
        }
    }
    points
}

/// All variant keys of the full variant space.
pub fn all_variant_keys(variants: &VariantMap) -> Vec<String> {
    all_variants(variants).iter().map(variant_key).collect()
}

/// Render a variant point as its key: axis values joined with `@` in
/// axis-name order. An all-empty point yields the empty-string key, which
/// is still distinct from "no variant" (`None`) at the token store.
pub fn variant_key(point: &VariantPoint) -> String {
    let mut key = String::new();
    for (i, value) in point.values().enumerate() {
        if i > 0 {
            key.push(VARIANT_SEPARATOR);
        }
        key.push_str(value);
    }
    key
}

/// Decorate a bundle name with a variant key, inserting it before the
/// file extension: `lib.js` + `fr@summer` -> `lib@fr@summer.js`.
pub fn variant_bundle_name(bundle_name: &str, key: &str) -> String {
    if key.is_empty() {
        return bundle_name.to_string();
    }
    match bundle_name.rfind('.') {
        Some(idx) => format!(
            "{}{}{}{}",
            &bundle_name[..idx],
            VARIANT_SEPARATOR,
            key,
            &bundle_name[idx..]
        ),
        None => format!("{bundle_name}{VARIANT_SEPARATOR}{key}"),
    }
}

// ============================================================================
// Union (composite initialization, generator-contributed variants)
// ============================================================================

/// Merge two variant maps, unioning keys per axis.
///
/// Merging fails when the same axis carries different default keys in the
/// two maps; silently picking one would make the "no selection" build
/// ambiguous.
pub fn union_variants(a: &VariantMap, b: &VariantMap) -> Result<VariantMap, EngineError> {
    if a.is_empty() {
        return Ok(b.clone());
    }
    if b.is_empty() {
        return Ok(a.clone());
    }

    let mut result = VariantMap::new();
    let axes: std::collections::BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for axis in axes {
        let first = a.get(axis);
        let second = b.get(axis);

        if let (Some(first), Some(second)) = (first, second)
            && !first.has_same_default(second)
        {
            return Err(EngineError::VariantDefaultConflict(axis.clone()));
        }

        let mut keys: Vec<String> = Vec::new();
        let mut default_key = String::new();
        for set in [first, second].into_iter().flatten() {
            for key in &set.keys {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
            default_key = set.default_key.clone();
        }
        result.insert(axis.clone(), VariantSet::new(axis.clone(), default_key, keys));
    }
    Ok(result)
}

// ============================================================================
// Request-time resolution
// ============================================================================

/// Per-axis strategy mapping a requested key to the nearest declared key.
pub trait AxisResolver: std::fmt::Debug + Send + Sync {
    /// Return the declared key to use for `requested`, or `None` to fall
    /// back to the axis default.
    fn resolve(&self, requested: &str, set: &VariantSet) -> Option<String>;
}

/// Default strategy: the requested key must match a declared key exactly.
#[derive(Debug)]
pub struct ExactMatchResolver;

impl AxisResolver for ExactMatchResolver {
    fn resolve(&self, requested: &str, set: &VariantSet) -> Option<String> {
        set.contains(requested).then(|| requested.to_string())
    }
}

/// Resolves a requested (possibly partial) variant selection down to the
/// closest point a bundle was actually built for.
#[derive(Debug)]
pub struct VariantResolver {
    default_strategy: Box<dyn AxisResolver>,
    per_axis: FxHashMap<String, Box<dyn AxisResolver>>,
}

impl Default for VariantResolver {
    fn default() -> Self {
        Self {
            default_strategy: Box::new(ExactMatchResolver),
            per_axis: FxHashMap::default(),
        }
    }
}

impl VariantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a custom strategy for one axis.
    pub fn with_axis_strategy(
        mut self,
        axis: impl Into<String>,
        strategy: Box<dyn AxisResolver>,
    ) -> Self {
        self.per_axis.insert(axis.into(), strategy);
        self
    }

    /// Intersect the requested selection against the declared axes and map
    /// each axis to a declared key. Requested axes the bundle does not
    /// declare are ignored; declared axes absent from the request fall back
    /// to their default key.
    pub fn resolve_point(&self, declared: &VariantMap, requested: &VariantPoint) -> VariantPoint {
        let mut point = VariantPoint::new();
        for (axis, set) in declared {
            let strategy = self
                .per_axis
                .get(axis)
                .unwrap_or(&self.default_strategy);
            let key = requested
                .get(axis)
                .and_then(|req| strategy.resolve(req, set))
                .unwrap_or_else(|| set.default_key.clone());
            point.insert(axis.clone(), key);
        }
        point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locale_skin() -> VariantMap {
        let mut map = VariantMap::new();
        map.insert(
            "locale".into(),
            VariantSet::new("locale", "", vec!["".into(), "fr".into(), "en_US".into()]),
        );
        map.insert(
            "skin".into(),
            VariantSet::new("skin", "summer", vec!["summer".into(), "winter".into()]),
        );
        map
    }

    #[test]
    fn test_cross_product_size() {
        // locale {"", fr, en_US} x skin {summer, winter} = 6 points
        let points = all_variants(&locale_skin());
        assert_eq!(points.len(), 6);

        // All points are distinct
        let keys = all_variant_keys(&locale_skin());
        let unique: std::collections::BTreeSet<&String> = keys.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_cross_product_empty_map() {
        assert!(all_variants(&VariantMap::new()).is_empty());
    }

    #[test]
    fn test_variant_key_axis_name_order() {
        let mut point = VariantPoint::new();
        point.insert("skin".into(), "winter".into());
        point.insert("locale".into(), "fr".into());
        // locale sorts before skin
        assert_eq!(variant_key(&point), "fr@winter");
    }

    #[test]
    fn test_variant_key_with_empty_axis_value() {
        let mut point = VariantPoint::new();
        point.insert("locale".into(), "".into());
        point.insert("skin".into(), "summer".into());
        assert_eq!(variant_key(&point), "@summer");
    }

    #[test]
    fn test_variant_bundle_name() {
        assert_eq!(variant_bundle_name("lib.js", "fr"), "lib@fr.js");
        assert_eq!(variant_bundle_name("lib.js", "fr@winter"), "lib@fr@winter.js");
        assert_eq!(variant_bundle_name("lib.js", ""), "lib.js");
        assert_eq!(variant_bundle_name("noext", "fr"), "noext@fr");
    }

    #[test]
    fn test_union_merges_keys() {
        let mut a = VariantMap::new();
        a.insert(
            "locale".into(),
            VariantSet::new("locale", "", vec!["".into(), "fr".into()]),
        );
        let mut b = VariantMap::new();
        b.insert(
            "locale".into(),
            VariantSet::new("locale", "", vec!["".into(), "es".into()]),
        );

        let merged = union_variants(&a, &b).unwrap();
        let set = &merged["locale"];
        assert_eq!(set.keys, vec!["", "fr", "es"]);
    }

    #[test]
    fn test_union_rejects_conflicting_defaults() {
        let mut a = VariantMap::new();
        a.insert(
            "skin".into(),
            VariantSet::new("skin", "summer", vec!["summer".into()]),
        );
        let mut b = VariantMap::new();
        b.insert(
            "skin".into(),
            VariantSet::new("skin", "winter", vec!["winter".into()]),
        );

        let err = union_variants(&a, &b).unwrap_err();
        assert!(matches!(err, EngineError::VariantDefaultConflict(axis) if axis == "skin"));
    }

    #[test]
    fn test_union_with_empty_side() {
        let declared = locale_skin();
        assert_eq!(union_variants(&declared, &VariantMap::new()).unwrap(), declared);
        assert_eq!(union_variants(&VariantMap::new(), &declared).unwrap(), declared);
    }

    #[test]
    fn test_resolve_exact_match() {
        let resolver = VariantResolver::new();
        let mut requested = VariantPoint::new();
        requested.insert("locale".into(), "fr".into());
        requested.insert("skin".into(), "winter".into());

        let point = resolver.resolve_point(&locale_skin(), &requested);
        assert_eq!(point["locale"], "fr");
        assert_eq!(point["skin"], "winter");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let resolver = VariantResolver::new();
        let mut requested = VariantPoint::new();
        // Unknown locale, skin axis not requested at all
        requested.insert("locale".into(), "de".into());

        let point = resolver.resolve_point(&locale_skin(), &requested);
        assert_eq!(point["locale"], "");
        assert_eq!(point["skin"], "summer");
    }

    #[test]
    fn test_resolve_ignores_undeclared_axes() {
        let resolver = VariantResolver::new();
        let mut requested = VariantPoint::new();
        requested.insert("browser".into(), "ie6".into());

        let point = resolver.resolve_point(&locale_skin(), &requested);
        assert!(!point.contains_key("browser"));
        assert_eq!(point.len(), 2);
    }

    #[test]
    fn test_custom_axis_strategy() {
        // Locale strategy that falls back from "fr_FR" to "fr"
        #[derive(Debug)]
        struct LanguageFallback;
        impl AxisResolver for LanguageFallback {
            fn resolve(&self, requested: &str, set: &VariantSet) -> Option<String> {
                if set.contains(requested) {
                    return Some(requested.to_string());
                }
                let lang = requested.split('_').next()?;
                set.contains(lang).then(|| lang.to_string())
            }
        }

        let resolver =
            VariantResolver::new().with_axis_strategy("locale", Box::new(LanguageFallback));
        let mut requested = VariantPoint::new();
        requested.insert("locale".into(), "fr_FR".into());

        let point = resolver.resolve_point(&locale_skin(), &requested);
        assert_eq!(point["locale"], "fr");
    }
}
