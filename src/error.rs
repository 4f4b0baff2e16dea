//! Engine error taxonomy.
//!
//! Two broad families:
//! - configuration errors, which fail the whole build pass before any
//!   request can be served (bad mappings, cycles, illegal dependencies)
//! - resource errors, where "not found" is a distinct recoverable outcome
//!   and anything else is fatal for the pass

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by bundle resolution, assembly and storage.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("duplicate bundle id [{0}]")]
    DuplicateBundleId(String),

    #[error("unknown bundle [{0}]")]
    UnknownBundle(String),

    #[error("dependency cycle detected involving bundle [{0}]")]
    DependencyCycle(String),

    #[error(
        "illegal dependency: global bundle [{global}] cannot take part in dependency ordering (edge with [{other}])"
    )]
    IllegalDependency { global: String, other: String },

    #[error("conflicting default key for variant axis '{0}' across merged variant sets")]
    VariantDefaultConflict(String),

    #[error("unknown post-processor '{0}'")]
    UnknownProcessor(String),

    #[error("generator prefix '{0}' is already registered")]
    DuplicateGeneratorPrefix(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("I/O failure while assembling bundle [{bundle}], member [{member}]")]
    AssemblyIo {
        bundle: String,
        member: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

impl EngineError {
    /// True for the recoverable "not found" outcome, which callers may
    /// translate into a transport-level response instead of failing.
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
