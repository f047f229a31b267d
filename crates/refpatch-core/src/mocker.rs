//! Mocker fixture
//!
//! One [`Mocker`] per test: it owns the patch session and exposes every
//! patch entry point. Dropping it undoes all patches unless configured
//! otherwise.

use crate::config::MockerConfig;
use crate::error::MockerError;
use crate::resolver::MethodResolver;
use crate::scanner::{ReferenceScanner, ScanReport};
use indexmap::IndexMap;
use refpatch_graph::{Heap, ObjectId, Value};
use refpatch_patch::{PatchOptions, PatchSession, Patcher, Reversible, TeardownError};
use std::sync::Arc;

/// Test-scoped patching facade
#[derive(Debug)]
pub struct Mocker {
    config: MockerConfig,
    patcher: Patcher,
    resolver: MethodResolver,
    scanner: ReferenceScanner,
}

impl Mocker {
    /// Create fixture with default configuration
    #[must_use]
    pub fn new(heap: Arc<Heap>) -> Self {
        Self::with_config(heap, MockerConfig::default())
    }

    /// Create fixture with explicit configuration
    #[must_use]
    pub fn with_config(heap: Arc<Heap>, config: MockerConfig) -> Self {
        let patcher = Patcher::new(Arc::new(PatchSession::new(heap)));
        Self {
            resolver: MethodResolver::new(patcher.clone()),
            scanner: ReferenceScanner::new(patcher.clone(), config.scan),
            patcher,
            config,
        }
    }

    /// Heap being patched
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<Heap> {
        self.patcher.heap()
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MockerConfig {
        &self.config
    }

    /// Number of patches awaiting teardown
    #[inline]
    #[must_use]
    pub fn active_patches(&self) -> usize {
        self.patcher.session().len()
    }

    /// Patch the attribute a bound or unbound method is published under
    ///
    /// # Errors
    /// See [`MethodResolver::patch_method`]
    pub fn patch_method(&self, callable: &Value, options: &PatchOptions) -> Result<Value, MockerError> {
        self.resolver.patch_method(callable, options)
    }

    /// Patch `owner.name`, naming the owner explicitly
    ///
    /// # Errors
    /// See [`MethodResolver::patch_member`]
    pub fn patch_member(
        &self,
        owner: ObjectId,
        name: &str,
        options: &PatchOptions,
    ) -> Result<Value, MockerError> {
        self.resolver.patch_member(owner, name, options)
    }

    /// Replace `target` everywhere it is currently held
    ///
    /// # Errors
    /// See [`ReferenceScanner::patch_references`]
    pub fn patch_references(&self, target: &Value, options: &PatchOptions) -> Result<Value, MockerError> {
        self.scanner.patch_references(target, options)
    }

    /// [`patch_references`](Self::patch_references), also returning what was patched
    ///
    /// # Errors
    /// See [`ReferenceScanner::patch_references`]
    pub fn patch_references_with_report(
        &self,
        target: &Value,
        options: &PatchOptions,
    ) -> Result<(Value, ScanReport), MockerError> {
        self.scanner.patch_references_with_report(target, options)
    }

    /// Patch `target.attribute`
    ///
    /// # Errors
    /// Returns patch errors from the named-attribute primitive
    pub fn object(
        &self,
        target: ObjectId,
        attribute: &str,
        options: &PatchOptions,
    ) -> Result<Value, MockerError> {
        Ok(self.patcher.object(target, attribute, options)?)
    }

    /// Patch several keys of a namespace
    ///
    /// # Errors
    /// Returns error if `mapping` is not a namespace
    pub fn dict(&self, mapping: ObjectId, entries: IndexMap<String, Value>) -> Result<(), MockerError> {
        Ok(self.patcher.dict(mapping, entries)?)
    }

    /// Start a custom reversible patch and register it for teardown
    ///
    /// # Errors
    /// Returns the patch's start error; nothing is registered
    pub fn start_patch(&self, patch: impl Reversible + 'static) -> Result<(), MockerError> {
        Ok(self.patcher.start_patch(patch)?)
    }

    /// Undo every patch, newest first
    ///
    /// # Errors
    /// Returns [`TeardownError`] after all patches were attempted if any failed
    pub fn stop_all(&self) -> Result<(), TeardownError> {
        self.patcher.session().stop_all()
    }
}

impl Drop for Mocker {
    fn drop(&mut self) {
        if !self.config.stop_on_drop {
            return;
        }
        if let Err(e) = self.stop_all() {
            tracing::error!(error = %e, "teardown on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn drop_restores() {
        let heap = Arc::new(Heap::new());
        let module = heap.new_module("m");
        heap.set_attr(module, "x", 1).unwrap();
        {
            let mocker = Mocker::new(Arc::clone(&heap));
            mocker
                .object(module, "x", &PatchOptions::new().with_new(2))
                .unwrap();
            assert_eq!(mocker.active_patches(), 1);
            assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(2));
        }
        assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(1));
    }

    #[test]
    fn drop_can_leave_patches_in_place() {
        let heap = Arc::new(Heap::new());
        let module = heap.new_module("m");
        heap.set_attr(module, "x", 1).unwrap();
        {
            let mocker = Mocker::with_config(
                Arc::clone(&heap),
                MockerConfig::new().with_stop_on_drop(false),
            );
            mocker
                .object(module, "x", &PatchOptions::new().with_new(2))
                .unwrap();
        }
        assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(2));
    }

    #[test]
    fn dict_passes_through() {
        let heap = Arc::new(Heap::new());
        let module = heap.new_module("m");
        let mocker = Mocker::new(Arc::clone(&heap));

        let entries = [("flag".to_string(), Value::Bool(true))].into_iter().collect();
        mocker.dict(module, entries).unwrap();
        assert_eq!(heap.get_attr(module, "flag").unwrap(), Value::Bool(true));

        mocker.stop_all().unwrap();
        assert!(heap.get_attr(module, "flag").is_err());
        assert_eq!(mocker.active_patches(), 0);
    }
}
