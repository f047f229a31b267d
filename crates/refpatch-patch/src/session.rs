//! Patch session
//!
//! A [`PatchSession`] is the registry of active patches for one test. Patches
//! are registered only once their `start` succeeded, and
//! [`PatchSession::stop_all`] undoes them newest first.

use crate::error::{PatchError, TeardownError};
use crate::patch::Reversible;
use parking_lot::Mutex;
use refpatch_graph::Heap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Ordered registry of active patches
pub struct PatchSession {
    heap: Arc<Heap>,
    active: Mutex<Vec<Box<dyn Reversible>>>,
}

impl PatchSession {
    /// Create empty session over `heap`
    #[must_use]
    pub fn new(heap: Arc<Heap>) -> Self {
        Self {
            heap,
            active: Mutex::new(Vec::new()),
        }
    }

    /// Heap the session patches
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<Heap> {
        &self.heap
    }

    /// Start `patch` and register it for teardown
    ///
    /// # Errors
    /// Returns the start error; the patch is not registered
    pub fn start(&self, mut patch: Box<dyn Reversible>) -> Result<(), PatchError> {
        patch.start(&self.heap)?;
        tracing::debug!(patch = %patch.describe(), "patch started");
        self.active.lock().push(patch);
        Ok(())
    }

    /// Number of active patches
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// True if nothing is patched
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }

    /// Stop every active patch, newest first
    ///
    /// A failing patch does not prevent the remaining ones from stopping.
    /// The session is empty afterwards either way.
    ///
    /// # Errors
    /// Returns [`TeardownError`] if any patch failed to stop
    pub fn stop_all(&self) -> Result<(), TeardownError> {
        let patches = std::mem::take(&mut *self.active.lock());
        let attempted = patches.len();
        let mut failures = Vec::new();

        for mut patch in patches.into_iter().rev() {
            match patch.stop(&self.heap) {
                Ok(()) => tracing::debug!(patch = %patch.describe(), "patch stopped"),
                Err(e) => {
                    tracing::warn!(patch = %patch.describe(), error = %e, "patch failed to stop");
                    failures.push(e);
                }
            }
        }

        match TeardownError::from_failures(attempted, failures) {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl Debug for PatchSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchSession")
            .field("active", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::MockReversible;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    fn session() -> PatchSession {
        PatchSession::new(Arc::new(Heap::new()))
    }

    fn double(name: &'static str) -> MockReversible {
        let mut patch = MockReversible::new();
        patch.expect_describe().returning(move || name.to_string());
        patch
    }

    #[test]
    fn failed_start_is_not_registered() {
        let session = session();
        let mut patch = double("bad");
        patch
            .expect_start()
            .returning(|_| Err(PatchError::NotStarted("bad".into())));
        patch.expect_stop().never();

        assert!(session.start(Box::new(patch)).is_err());
        assert!(session.is_empty());
        assert!(session.stop_all().is_ok());
    }

    #[test]
    fn stops_in_reverse_order() {
        let session = session();
        let mut seq = Sequence::new();

        let mut first = double("first");
        let mut second = double("second");
        first.expect_start().returning(|_| Ok(()));
        second.expect_start().returning(|_| Ok(()));
        second
            .expect_stop()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        first
            .expect_stop()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        session.start(Box::new(first)).unwrap();
        session.start(Box::new(second)).unwrap();
        assert_eq!(session.len(), 2);
        session.stop_all().unwrap();
        assert!(session.is_empty());
    }

    #[test]
    fn teardown_continues_past_failures() {
        let session = session();

        let mut ok = double("ok");
        ok.expect_start().returning(|_| Ok(()));
        ok.expect_stop().times(1).returning(|_| Ok(()));

        let mut failing = double("failing");
        failing.expect_start().returning(|_| Ok(()));
        failing
            .expect_stop()
            .times(1)
            .returning(|_| Err(PatchError::NotStarted("failing".into())));

        let mut also_failing = double("also_failing");
        also_failing.expect_start().returning(|_| Ok(()));
        also_failing
            .expect_stop()
            .times(1)
            .returning(|_| Err(PatchError::NotStarted("also_failing".into())));

        session.start(Box::new(ok)).unwrap();
        session.start(Box::new(failing)).unwrap();
        session.start(Box::new(also_failing)).unwrap();

        let err = session.stop_all().unwrap_err();
        assert_eq!(err.attempted, 3);
        assert_eq!(err.failed, 2);
        assert_eq!(*err.first, PatchError::NotStarted("also_failing".into()));
        assert!(session.is_empty());
    }

    #[test]
    fn stop_all_twice_is_noop() {
        let session = session();
        let mut patch = double("once");
        patch.expect_start().returning(|_| Ok(()));
        patch.expect_stop().times(1).returning(|_| Ok(()));

        session.start(Box::new(patch)).unwrap();
        session.stop_all().unwrap();
        session.stop_all().unwrap();
    }
}
