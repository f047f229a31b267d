//! Error types for patching
//!
//! Provides error handling for:
//! - Installing a patch (missing attributes, conflicting options)
//! - Removing a patch
//! - Session teardown, where every failure is collected

use refpatch_graph::GraphError;

/// Errors raised while installing or removing a single patch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// Underlying graph operation failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Target has no such attribute and `create` was not requested
    #[error("{owner} has no attribute '{name}' (set `create` to add it)")]
    MissingAttribute {
        /// Description of the patch target
        owner: String,
        /// Attribute name
        name: String,
    },

    /// Two options that cannot be combined
    #[error("cannot combine `{0}` with `{1}`")]
    ConflictingOptions(&'static str, &'static str),

    /// `stop` called on a patch that never started
    #[error("patch of {0} was never started")]
    NotStarted(String),
}

impl PatchError {
    /// True if the failure came from a missing attribute
    #[inline]
    #[must_use]
    pub fn is_missing_attribute(&self) -> bool {
        match self {
            Self::MissingAttribute { .. } => true,
            Self::Graph(e) => e.is_missing_attribute(),
            _ => false,
        }
    }
}

/// Failure of one or more patches during [`PatchSession::stop_all`](crate::PatchSession::stop_all)
///
/// Only produced after every patch in the session was given a chance to stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{failed} of {attempted} patch(es) failed to stop; first failure: {first}")]
pub struct TeardownError {
    /// Patches the teardown tried to stop
    pub attempted: usize,
    /// Patches whose stop failed
    pub failed: usize,
    /// First failure, in teardown order
    #[source]
    pub first: Box<PatchError>,
    /// Remaining failures, in teardown order
    pub rest: Vec<PatchError>,
}

impl TeardownError {
    /// Build from a non-empty failure list
    ///
    /// Returns `None` when `failures` is empty.
    #[must_use]
    pub fn from_failures(attempted: usize, failures: Vec<PatchError>) -> Option<Self> {
        let failed = failures.len();
        let mut failures = failures.into_iter();
        let first = failures.next()?;
        Some(Self {
            attempted,
            failed,
            first: Box::new(first),
            rest: failures.collect(),
        })
    }

    /// Every failure, first one first
    pub fn failures(&self) -> impl Iterator<Item = &PatchError> {
        std::iter::once(self.first.as_ref()).chain(self.rest.iter())
    }
}
