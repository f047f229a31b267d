//! Back-reference index
//!
//! Provides [`ReferrerIndex`]: for every referenced object, which objects hold
//! a direct reference to it and how many times. The heap updates it on every
//! store, so "who references X" is a lookup rather than a heap walk.

use crate::value::ObjectId;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Reverse index: target -> holder -> reference count
///
/// Holders are kept in first-reference order so lookups are deterministic.
#[derive(Debug, Default, Clone)]
pub struct ReferrerIndex {
    by_target: HashMap<ObjectId, IndexMap<ObjectId, usize>>,
}

impl ReferrerIndex {
    /// Create empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reference from `holder` to `target`
    pub fn link(&mut self, holder: ObjectId, target: ObjectId) {
        *self
            .by_target
            .entry(target)
            .or_default()
            .entry(holder)
            .or_insert(0) += 1;
    }

    /// Drop one reference from `holder` to `target`
    ///
    /// Unlinking a reference that was never linked is a no-op.
    pub fn unlink(&mut self, holder: ObjectId, target: ObjectId) {
        let Some(holders) = self.by_target.get_mut(&target) else {
            return;
        };
        if let Some(count) = holders.get_mut(&holder) {
            *count -= 1;
            if *count == 0 {
                holders.shift_remove(&holder);
            }
        }
        if holders.is_empty() {
            self.by_target.remove(&target);
        }
    }

    /// Objects currently holding `target`, in first-reference order
    #[must_use]
    pub fn referrers(&self, target: ObjectId) -> Vec<ObjectId> {
        self.by_target
            .get(&target)
            .map(|holders| holders.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of references from `holder` to `target`
    #[inline]
    #[must_use]
    pub fn count(&self, holder: ObjectId, target: ObjectId) -> usize {
        self.by_target
            .get(&target)
            .and_then(|holders| holders.get(&holder))
            .copied()
            .unwrap_or(0)
    }

    /// Forget everything known about references to `target`
    ///
    /// Returns the number of holders dropped.
    pub fn forget(&mut self, target: ObjectId) -> usize {
        self.by_target.remove(&target).map_or(0, |holders| holders.len())
    }

    /// Number of distinct referenced objects
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    /// True if nothing is referenced
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
