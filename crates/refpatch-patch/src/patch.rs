//! Reversible patches
//!
//! Every patch a session tracks implements [`Reversible`]: `start` installs
//! the substitute and remembers what it displaced, `stop` puts it back.
//! Restoration is per location, so a location that had no own value before
//! the patch has none afterwards. Displaced objects are pinned in the heap
//! until restored, so a collection mid-test cannot free them.

use crate::error::PatchError;
use indexmap::IndexMap;
use refpatch_graph::{Heap, ObjectId, Value};

/// A patch that can be installed and later undone
#[cfg_attr(test, mockall::automock)]
pub trait Reversible: Send {
    /// Install the substitute, recording the displaced state
    ///
    /// # Errors
    /// On error nothing has been changed
    fn start(&mut self, heap: &Heap) -> Result<(), PatchError>;

    /// Restore the recorded state
    ///
    /// # Errors
    /// Returns error if the patch was never started or the location is gone
    fn stop(&mut self, heap: &Heap) -> Result<(), PatchError>;

    /// Short description for diagnostics
    fn describe(&self) -> String;
}

/// Replaces one named attribute on an object
///
/// The displaced value is the object's own value, not an inherited one.
/// Stopping a patch that shadowed an inherited attribute deletes the shadow.
#[derive(Debug, Clone)]
pub struct NamedAttributePatch {
    target: ObjectId,
    attribute: String,
    substitute: Value,
    saved: Option<Option<Value>>,
}

impl NamedAttributePatch {
    /// Patch `target.attribute` with `substitute`
    #[must_use]
    pub fn new(target: ObjectId, attribute: impl Into<String>, substitute: Value) -> Self {
        Self {
            target,
            attribute: attribute.into(),
            substitute,
            saved: None,
        }
    }

    /// Object being patched
    #[inline]
    #[must_use]
    pub fn target(&self) -> ObjectId {
        self.target
    }

    /// Attribute being patched
    #[inline]
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Installed value
    #[inline]
    #[must_use]
    pub fn substitute(&self) -> &Value {
        &self.substitute
    }
}

impl Reversible for NamedAttributePatch {
    fn start(&mut self, heap: &Heap) -> Result<(), PatchError> {
        let own = heap.own_attr(self.target, &self.attribute)?;
        heap.set_attr(self.target, &self.attribute, self.substitute.clone())?;
        if let Some(original) = &own {
            heap.pin(original);
        }
        self.saved = Some(own);
        Ok(())
    }

    fn stop(&mut self, heap: &Heap) -> Result<(), PatchError> {
        match self.saved.take() {
            None => Err(PatchError::NotStarted(self.describe())),
            Some(Some(original)) => {
                let restored = heap.set_attr(self.target, &self.attribute, original.clone());
                heap.unpin(&original);
                Ok(restored?)
            }
            Some(None) => {
                heap.del_attr(self.target, &self.attribute)?;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        format!("{}.{}", self.target, self.attribute)
    }
}

/// Replaces several keys of one namespace at once
#[derive(Debug, Clone)]
pub struct MappingPatch {
    mapping: ObjectId,
    entries: IndexMap<String, Value>,
    saved: Option<Vec<(String, Option<Value>)>>,
}

impl MappingPatch {
    /// Patch `mapping[key] = value` for every entry
    #[must_use]
    pub fn new(mapping: ObjectId, entries: IndexMap<String, Value>) -> Self {
        Self {
            mapping,
            entries,
            saved: None,
        }
    }

    /// Namespace being patched
    #[inline]
    #[must_use]
    pub fn mapping(&self) -> ObjectId {
        self.mapping
    }

    /// Keys being patched, in application order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Reversible for MappingPatch {
    fn start(&mut self, heap: &Heap) -> Result<(), PatchError> {
        // Resolve the mapping up front so a bad target changes nothing.
        heap.namespace_entries(self.mapping)?;

        let mut saved = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            let old = heap.namespace_set(self.mapping, key, value.clone())?;
            if let Some(original) = &old {
                heap.pin(original);
            }
            saved.push((key.clone(), old));
        }
        self.saved = Some(saved);
        Ok(())
    }

    fn stop(&mut self, heap: &Heap) -> Result<(), PatchError> {
        let Some(saved) = self.saved.take() else {
            return Err(PatchError::NotStarted(self.describe()));
        };
        let mut first_error = None;
        for (key, old) in saved.into_iter().rev() {
            let restored = match &old {
                Some(value) => heap.namespace_set(self.mapping, &key, value.clone()),
                None => heap.namespace_remove(self.mapping, &key),
            };
            if let Some(value) = &old {
                heap.unpin(value);
            }
            if let Err(e) = restored {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        let keys: Vec<&str> = self.keys().collect();
        format!("{}[{}]", self.mapping, keys.join(", "))
    }
}
