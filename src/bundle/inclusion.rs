//! Inclusion pattern: where and when a bundle takes part in a page.

/// Rule set governing whether a bundle is global or context-scoped, its
/// order among globals, and its debug/production visibility.
///
/// `include_on_debug` and `exclude_on_debug` are mutually exclusive by
/// construction contract; the configuration layer rejects definitions
/// setting both, this type does not re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionPattern {
    /// Global bundles are the mandatory prefix of every page.
    pub is_global: bool,
    /// Sort key among globals, lower first. Meaningful only when global.
    pub inclusion_order: i32,
    /// Bundle exists ONLY in debug mode.
    pub include_on_debug: bool,
    /// Bundle exists ONLY in production mode.
    pub exclude_on_debug: bool,
}

impl InclusionPattern {
    /// A context-scoped bundle visible in both modes.
    pub const fn context() -> Self {
        Self {
            is_global: false,
            inclusion_order: 0,
            include_on_debug: false,
            exclude_on_debug: false,
        }
    }

    /// A global bundle with the given inclusion order, visible in both modes.
    pub const fn global(inclusion_order: i32) -> Self {
        Self {
            is_global: true,
            inclusion_order,
            include_on_debug: false,
            exclude_on_debug: false,
        }
    }

    /// Restrict visibility to debug mode only.
    pub const fn debug_only(mut self) -> Self {
        self.include_on_debug = true;
        self
    }

    /// Restrict visibility to production mode only.
    pub const fn production_only(mut self) -> Self {
        self.exclude_on_debug = true;
        self
    }

    /// Whether the bundle exists at all in the given mode.
    ///
    /// A bundle is dropped from the active set when
    /// `(debug && exclude_on_debug) || (!debug && include_on_debug)`.
    #[inline]
    pub fn is_active(&self, debug_on: bool) -> bool {
        !((debug_on && self.exclude_on_debug) || (!debug_on && self.include_on_debug))
    }
}
