//! Call-recording mock objects
//!
//! A [`MockState`] lives in the heap like any other object so it can be
//! installed wherever a real value was. Calls are recorded in order; the
//! result of a call comes from the side effect, then the return value, and
//! otherwise from a lazily created child mock.

use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// What a mock does when called, ahead of its return value
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    /// Fail every call with this message
    Raise(String),

    /// Return these values one per call, failing once exhausted
    Values(VecDeque<Value>),
}

/// Constraints copied from the object a mock stands in for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockSpec {
    /// Attribute names the mock may expose, `None` for unrestricted
    pub attributes: Option<IndexSet<String>>,

    /// Also reject assignment of names outside `attributes`
    pub spec_set: bool,

    /// Positional arity enforced on calls
    pub arity: Option<usize>,

    /// Bind to the instance when found on a type, like a function does
    pub binds: bool,
}

impl MockSpec {
    /// True if reading `name` is allowed
    #[must_use]
    pub fn allows(&self, name: &str) -> bool {
        self.attributes.as_ref().map_or(true, |names| names.contains(name))
    }

    /// True if assigning `name` is allowed
    #[must_use]
    pub fn allows_set(&self, name: &str) -> bool {
        !self.spec_set || self.allows(name)
    }
}

/// State of one mock object
#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub(crate) name: String,
    pub(crate) return_value: Option<Value>,
    pub(crate) side_effect: Option<SideEffect>,
    pub(crate) calls: Vec<Vec<Value>>,
    pub(crate) children: IndexMap<String, Value>,
    pub(crate) spec: MockSpec,
}

impl MockState {
    /// Unconfigured mock with a display name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the value returned by calls
    #[inline]
    #[must_use]
    pub fn with_return_value(mut self, value: Value) -> Self {
        self.return_value = Some(value);
        self
    }

    /// Set the side effect
    #[inline]
    #[must_use]
    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effect = Some(effect);
        self
    }

    /// Set the spec
    #[inline]
    #[must_use]
    pub fn with_spec(mut self, spec: MockSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Preconfigure a child attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.children.insert(name.into(), value);
        self
    }

    /// Display name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of recorded calls
    #[inline]
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Recorded call arguments, oldest first
    #[inline]
    #[must_use]
    pub fn calls(&self) -> &[Vec<Value>] {
        &self.calls
    }

    /// Configured return value, if any
    #[inline]
    #[must_use]
    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Spec constraints
    #[inline]
    #[must_use]
    pub fn spec(&self) -> &MockSpec {
        &self.spec
    }

    pub(crate) fn for_each_value(&self, visit: &mut impl FnMut(&Value)) {
        if let Some(v) = &self.return_value {
            visit(v);
        }
        if let Some(SideEffect::Values(values)) = &self.side_effect {
            values.iter().for_each(&mut *visit);
        }
        self.children.values().for_each(&mut *visit);
        self.calls.iter().flatten().for_each(&mut *visit);
    }
}
