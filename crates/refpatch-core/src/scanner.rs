//! Reference scanning
//!
//! Replaces a live object everywhere it is currently held. Holders come
//! from the heap's referrer index, restricted to objects reachable from the
//! root set; each one is classified and patched with the narrowest
//! reversible patch that covers it.

use crate::config::ScanConfig;
use crate::error::MockerError;
use crate::resolver::bound_owner;
use crate::slot_patch::SlotPatch;
use refpatch_graph::{GraphError, Heap, ObjectId, ObjectKind, Value};
use refpatch_patch::{PatchError, PatchOptions, Patcher, Reversible};

/// Key the target is parked under while its substitute is built
const SCRATCH_KEY: &str = "target";

/// How a referrer holds the target
#[derive(Debug, Clone, PartialEq, Eq)]
enum Holder {
    /// Namespace keys whose value is the target
    Mapping(Vec<String>),
    /// Declared slots whose value is the target
    Slots(Vec<String>),
    /// Storage this scanner does not patch
    Other(ObjectKind),
}

/// Rooted throwaway namespace the substitute is built against
///
/// Registered ahead of the substitute's own patch, so teardown reaches it
/// last and finds the target restored under [`SCRATCH_KEY`].
#[derive(Debug)]
struct ScratchHolder {
    namespace: ObjectId,
    target: Value,
    started: bool,
}

impl ScratchHolder {
    fn new(namespace: ObjectId, target: Value) -> Self {
        Self {
            namespace,
            target,
            started: false,
        }
    }
}

impl Reversible for ScratchHolder {
    fn start(&mut self, heap: &Heap) -> Result<(), PatchError> {
        heap.namespace_set(self.namespace, SCRATCH_KEY, self.target.clone())?;
        heap.root(self.namespace)?;
        self.started = true;
        Ok(())
    }

    fn stop(&mut self, heap: &Heap) -> Result<(), PatchError> {
        if !std::mem::take(&mut self.started) {
            return Err(PatchError::NotStarted(self.describe()));
        }
        heap.unroot(self.namespace);
        heap.namespace_remove(self.namespace, SCRATCH_KEY)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("scratch holder {}", self.namespace)
    }
}

/// Counts of what one scan patched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Namespaces patched (one mapping patch each)
    pub mappings: usize,
    /// Slots patched
    pub slots: usize,
    /// Holders left untouched
    pub skipped: usize,
}

/// Patches every holder of a live object
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    patcher: Patcher,
    config: ScanConfig,
}

impl ReferenceScanner {
    /// Create scanner issuing patches through `patcher`
    #[inline]
    #[must_use]
    pub fn new(patcher: Patcher, config: ScanConfig) -> Self {
        Self { patcher, config }
    }

    /// Scan configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Replace `target` in every namespace entry and slot that holds it
    ///
    /// Returns the substitute. A bound method is patched on its receiver
    /// instead, since bound methods are created per access and never held.
    /// Holders not reachable from the root set are neither inspected nor
    /// patched.
    ///
    /// # Errors
    /// - [`MockerError::NoIdentity`] for primitive targets
    /// - patch errors from building or installing the substitute; patches
    ///   installed before the failure stay registered for teardown
    pub fn patch_references(&self, target: &Value, options: &PatchOptions) -> Result<Value, MockerError> {
        self.patch_references_with_report(target, options)
            .map(|(substitute, _)| substitute)
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
        let heap = self.patcher.heap();
        let id = target
            .object_id()
            .ok_or_else(|| MockerError::NoIdentity(heap.describe(target)))?;

        if heap.kind(id)? == ObjectKind::BoundMethod {
            let (owner, name) =
                bound_owner(heap, id).ok_or_else(|| MockerError::NotAMethod(heap.describe(target)))?;
            let substitute = self.patcher.object(owner, &name, options)?;
            return Ok((substitute, ScanReport::default()));
        }

        if self.config.collect_before_scan {
            collect_keeping(heap, id)?;
        }

        let reachable = heap.reachable_from_roots();

        // Build the substitute against a throwaway holder so every option
        // is honored without touching a real location yet.
        let scratch = heap.new_namespace();
        self.patcher
            .start_patch(ScratchHolder::new(scratch, target.clone()))?;
        let substitute = self.patcher.object(scratch, SCRATCH_KEY, options)?;

        let mut report = ScanReport::default();
        for holder in heap.referrers(id) {
            if holder == scratch {
                continue;
            }
            if !reachable.contains(&holder) {
                tracing::trace!(%holder, "unreachable holder ignored");
                continue;
            }
            match classify(heap, holder, id)? {
                Holder::Mapping(keys) if self.config.mapping_holders && !keys.is_empty() => {
                    let entries = keys
                        .into_iter()
                        .map(|key| (key, substitute.clone()))
                        .collect();
                    self.patcher.dict(holder, entries)?;
                    report.mappings += 1;
                }
                Holder::Slots(slots) if self.config.slot_holders && !slots.is_empty() => {
                    for slot in slots {
                        self.patcher
                            .start_patch(SlotPatch::new(holder, slot, substitute.clone()))?;
                        report.slots += 1;
                    }
                }
                skipped => {
                    tracing::trace!(%holder, ?skipped, "holder left untouched");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            object = %heap.describe(target),
            mappings = report.mappings,
            slots = report.slots,
            skipped = report.skipped,
            "patched references"
        );
        Ok((substitute, report))
    }
}

fn classify(heap: &Heap, holder: ObjectId, target: ObjectId) -> Result<Holder, GraphError> {
    match heap.kind(holder)? {
        ObjectKind::Namespace => Ok(Holder::Mapping(heap.namespace_keys_holding(holder, target)?)),
        ObjectKind::Instance => match heap.slot_names(holder)? {
            Some(names) => {
                let mut holding = Vec::new();
                for name in names {
                    if heap.get_slot(holder, &name)? == Some(Value::Ref(target)) {
                        holding.push(name);
                    }
                }
                Ok(Holder::Slots(holding))
            }
            None => Ok(Holder::Other(ObjectKind::Instance)),
        },
        kind => Ok(Holder::Other(kind)),
    }
}

/// Collect unreachable objects without losing `target`
fn collect_keeping(heap: &Heap, target: ObjectId) -> Result<(), GraphError> {
    let was_rooted = heap.is_rooted(target);
    heap.root(target)?;
    heap.collect();
    if !was_rooted {
        heap.unroot(target);
    }
    Ok(())
}
