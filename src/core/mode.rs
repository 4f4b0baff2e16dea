//! Debug vs production resolution mode.

/// The two resolution states of the engine.
///
/// Selected by the active configuration flag at request time; the engine
/// is told which mode to use and is stateless across calls otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Individually addressable members, no hashing, no artifact reads.
    Debug,
    /// One pre-built, hashed artifact per bundle.
    Production,
}

impl ResolveMode {
    /// Map the configuration debug flag to a mode.
    #[inline]
    pub fn from_debug_flag(debug_on: bool) -> Self {
        if debug_on {
            ResolveMode::Debug
        } else {
            ResolveMode::Production
        }
    }

    #[inline]
    pub fn is_debug(self) -> bool {
        self == ResolveMode::Debug
    }
}
