//! Patch configuration
//!
//! [`PatchOptions`] carries everything that decides what substitute a patch
//! installs: an explicit replacement, a factory, or a mock shaped by spec,
//! autospec, return value, side effect and preconfigured attributes.

use crate::error::PatchError;
use indexmap::IndexMap;
use refpatch_graph::{GraphError, Heap, ObjectId, SideEffect, Value};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Factory producing a substitute in place of the default mock
pub type NewCallable = Arc<dyn Fn(&Heap) -> Result<Value, GraphError> + Send + Sync>;

/// Source of a mock's allowed attribute names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spec {
    /// Copy the names visible on a live object
    Object(ObjectId),

    /// Use exactly these names
    Names(Vec<String>),
}

/// Options accepted by every patch entry point
#[derive(Clone, Default)]
pub struct PatchOptions {
    /// Install this value instead of building a mock
    pub new: Option<Value>,

    /// Build the substitute with this factory instead of the default mock
    pub new_callable: Option<NewCallable>,

    /// Restrict the mock's attributes
    pub spec: Option<Spec>,

    /// Also restrict assignments to spec'd names
    pub spec_set: bool,

    /// Derive spec (and call arity) from the value being replaced
    pub autospec: bool,

    /// Allow patching an attribute that does not exist yet
    pub create: bool,

    /// Value returned by calls to the mock
    pub return_value: Option<Value>,

    /// Side effect of calls to the mock
    pub side_effect: Option<SideEffect>,

    /// Display name of the mock, defaults to the attribute name
    pub name: Option<String>,

    /// Attributes preset on the mock
    pub attributes: IndexMap<String, Value>,
}

impl PatchOptions {
    /// Default options: a plain mock, attribute must exist
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With explicit replacement
    #[inline]
    #[must_use]
    pub fn with_new(mut self, value: impl Into<Value>) -> Self {
        self.new = Some(value.into());
        self
    }

    /// With substitute factory
    #[must_use]
    pub fn with_new_callable<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Heap) -> Result<Value, GraphError> + Send + Sync + 'static,
    {
        self.new_callable = Some(Arc::new(factory));
        self
    }

    /// With spec
    #[inline]
    #[must_use]
    pub fn with_spec(mut self, spec: Spec) -> Self {
        self.spec = Some(spec);
        self
    }

    /// With spec restricting reads and assignments
    #[inline]
    #[must_use]
    pub fn with_spec_set(mut self, spec: Spec) -> Self {
        self.spec = Some(spec);
        self.spec_set = true;
        self
    }

    /// With autospec from the replaced value
    #[inline]
    #[must_use]
    pub fn with_autospec(mut self) -> Self {
        self.autospec = true;
        self
    }

    /// Allow creating a missing attribute
    #[inline]
    #[must_use]
    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    /// With return value
    #[inline]
    #[must_use]
    pub fn with_return_value(mut self, value: impl Into<Value>) -> Self {
        self.return_value = Some(value.into());
        self
    }

    /// With side effect
    #[inline]
    #[must_use]
    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effect = Some(effect);
        self
    }

    /// With mock name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Preset an attribute on the mock
    #[inline]
    #[must_use]
    pub fn configure(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Reject option combinations that have no single meaning
    ///
    /// # Errors
    /// Returns [`PatchError::ConflictingOptions`] naming the pair
    pub fn validate(&self) -> Result<(), PatchError> {
        if self.new.is_some() && self.new_callable.is_some() {
            return Err(PatchError::ConflictingOptions("new", "new_callable"));
        }
        if self.new.is_some() && self.autospec {
            return Err(PatchError::ConflictingOptions("new", "autospec"));
        }
        if self.spec.is_some() && self.autospec {
            return Err(PatchError::ConflictingOptions("spec", "autospec"));
        }
        if self.new_callable.is_some() && self.autospec {
            return Err(PatchError::ConflictingOptions("new_callable", "autospec"));
        }
        Ok(())
    }

    /// True if the options describe a mock rather than a ready-made value
    #[inline]
    #[must_use]
    pub fn builds_mock(&self) -> bool {
        self.new.is_none() && self.new_callable.is_none()
    }
}

impl Debug for PatchOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchOptions")
            .field("new", &self.new)
            .field("new_callable", &self.new_callable.as_ref().map(|_| "<factory>"))
            .field("spec", &self.spec)
            .field("spec_set", &self.spec_set)
            .field("autospec", &self.autospec)
            .field("create", &self.create)
            .field("return_value", &self.return_value)
            .field("side_effect", &self.side_effect)
            .field("name", &self.name)
            .field("attributes", &self.attributes)
            .finish()
    }
}
