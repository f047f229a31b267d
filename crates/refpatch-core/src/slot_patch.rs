//! Fixed-slot patch
//!
//! Replaces one declared slot of a slotted instance. Only slot access is
//! used, so an unset slot is unset again after `stop`. The displaced value
//! is pinned while the patch is active.

use refpatch_graph::{Heap, ObjectId, Value};
use refpatch_patch::{PatchError, Reversible};

/// Replaces `holder.slot` on an instance with fixed slots
#[derive(Debug, Clone)]
pub struct SlotPatch {
    holder: ObjectId,
    slot: String,
    substitute: Value,
    saved: Option<Option<Value>>,
}

impl SlotPatch {
    /// Patch `holder.slot` with `substitute`
    #[must_use]
    pub fn new(holder: ObjectId, slot: impl Into<String>, substitute: Value) -> Self {
        Self {
            holder,
            slot: slot.into(),
            substitute,
            saved: None,
        }
    }

    /// Slot being patched
    #[inline]
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl Reversible for SlotPatch {
    fn start(&mut self, heap: &Heap) -> Result<(), PatchError> {
        let old = heap.set_slot(self.holder, &self.slot, Some(self.substitute.clone()))?;
        if let Some(original) = &old {
            heap.pin(original);
        }
        self.saved = Some(old);
        Ok(())
    }

    fn stop(&mut self, heap: &Heap) -> Result<(), PatchError> {
        let Some(old) = self.saved.take() else {
            return Err(PatchError::NotStarted(self.describe()));
        };
        let restored = heap.set_slot(self.holder, &self.slot, old.clone());
        if let Some(original) = &old {
            heap.unpin(original);
        }
        restored?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}.{} (slot)", self.holder, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refpatch_graph::GraphError;

    #[test]
    fn restores_set_slot() {
        let heap = Heap::new();
        let class = heap.new_slotted_type("Holder", &[], &["dt"]).unwrap();
        let instance = heap.instantiate(class).unwrap();
        heap.set_slot(instance, "dt", Some(Value::Int(1))).unwrap();

        let mut patch = SlotPatch::new(instance, "dt", Value::Int(2));
        patch.start(&heap).unwrap();
        assert_eq!(heap.get_slot(instance, "dt").unwrap(), Some(Value::Int(2)));

        patch.stop(&heap).unwrap();
        assert_eq!(heap.get_slot(instance, "dt").unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn restores_unset_slot() {
        let heap = Heap::new();
        let class = heap.new_slotted_type("Holder", &[], &["dt"]).unwrap();
        let instance = heap.instantiate(class).unwrap();

        let mut patch = SlotPatch::new(instance, "dt", Value::Int(2));
        patch.start(&heap).unwrap();
        patch.stop(&heap).unwrap();
        assert_eq!(heap.get_slot(instance, "dt").unwrap(), None);
    }

    #[test]
    fn undeclared_slot_fails_to_start() {
        let heap = Heap::new();
        let class = heap.new_slotted_type("Holder", &[], &["dt"]).unwrap();
        let instance = heap.instantiate(class).unwrap();

        let mut patch = SlotPatch::new(instance, "other", Value::None);
        assert!(matches!(
            patch.start(&heap),
            Err(PatchError::Graph(GraphError::NotASlot { .. }))
        ));
        assert!(patch.stop(&heap).is_err());
    }
}
