//! Dependency ordering between bundles.
//!
//! Each bundle may declare other bundles it depends on. Resolution
//! expands those declarations into the full transitive list, deduplicated
//! and ordered most-foundational-first: for every edge A -> B, B appears
//! before A's own entry. Global bundles sit outside the graph entirely,
//! since they are already the unconditional prefix of every page; any
//! edge touching one is a configuration error.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bundle::Bundle;
use crate::error::EngineError;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Resolve the declared dependencies of every bundle in the set.
///
/// On success each bundle's resolved list is populated. Fails on unknown
/// bundle names, cycles, and edges involving a global bundle.
pub fn resolve_dependencies(bundles: &[Arc<Bundle>]) -> Result<(), EngineError> {
    let by_name: FxHashMap<&str, &Arc<Bundle>> = bundles
        .iter()
        .map(|bundle| (bundle.name.as_str(), bundle))
        .collect();

    let mut marks: FxHashMap<String, Mark> = FxHashMap::default();
    let mut cache: FxHashMap<String, Vec<String>> = FxHashMap::default();

    for bundle in bundles {
        if bundle.is_global() {
            if let Some(dep) = bundle.declared_dependencies.first() {
                return Err(EngineError::IllegalDependency {
                    global: bundle.name.clone(),
                    other: dep.clone(),
                });
            }
            continue;
        }
        let resolved = visit(bundle, &by_name, &mut marks, &mut cache)?;
        bundle.set_resolved_dependencies(resolved);
    }

    Ok(())
}

/// Postorder DFS. Returns the transitive dependency ids of `bundle`,
/// deduplicated, dependencies of a bundle listed before the bundle itself.
fn visit(
    bundle: &Arc<Bundle>,
    by_name: &FxHashMap<&str, &Arc<Bundle>>,
    marks: &mut FxHashMap<String, Mark>,
    cache: &mut FxHashMap<String, Vec<String>>,
) -> Result<Vec<String>, EngineError> {
    if let Some(resolved) = cache.get(&bundle.name) {
        return Ok(resolved.clone());
    }
    if marks.get(&bundle.name) == Some(&Mark::Visiting) {
        return Err(EngineError::DependencyCycle(bundle.name.clone()));
    }
    marks.insert(bundle.name.clone(), Mark::Visiting);

    let mut ordered: Vec<String> = Vec::new();
    for dep_name in &bundle.declared_dependencies {
        let dep = by_name
            .get(dep_name.as_str())
            .copied()
            .ok_or_else(|| EngineError::UnknownBundle(dep_name.clone()))?;
        if dep.is_global() {
            return Err(EngineError::IllegalDependency {
                global: dep.name.clone(),
                other: bundle.name.clone(),
            });
        }

        for id in visit(dep, by_name, marks, cache)? {
            if !ordered.contains(&id) {
                ordered.push(id);
            }
        }
        if !ordered.contains(&dep.id) {
            ordered.push(dep.id.clone());
        }
    }

    marks.insert(bundle.name.clone(), Mark::Done);
    cache.insert(bundle.name.clone(), ordered.clone());
    Ok(ordered)
}
