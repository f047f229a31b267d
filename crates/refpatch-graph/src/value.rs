//! Values and object identity
//!
//! Provides [`ObjectId`] (heap identity) and [`Value`] (what a slot, namespace
//! entry or call argument holds).

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Identity of a heap object
///
/// Two values refer to the same object iff their ids are equal. Ids are never
/// reused within one [`Heap`](crate::Heap), even after collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Arena index of this object
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value stored in the object graph
///
/// Primitives are compared by value and carry no identity; [`Value::Ref`]
/// compares by identity, so the derived `PartialEq` is an `is` check for heap
/// objects.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,

    /// Boolean
    Bool(bool),

    /// Signed integer
    Int(i64),

    /// Immutable string
    Str(Arc<str>),

    /// Reference to a heap object
    Ref(ObjectId),
}

impl Value {
    /// Build a string value
    #[inline]
    #[must_use]
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Heap identity, if this value is a reference
    #[inline]
    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Identity check against a heap object
    #[inline]
    #[must_use]
    pub fn is(&self, id: ObjectId) -> bool {
        matches!(self, Self::Ref(own) if *own == id)
    }

    /// True for [`Value::None`]
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Self::Ref(id)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Ref(id) => write!(f, "<object {id}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refs_compare_by_identity() {
        let a = Value::Ref(ObjectId::from_index(3));
        let b = Value::Ref(ObjectId::from_index(3));
        let c = Value::Ref(ObjectId::from_index(4));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is(ObjectId::from_index(3)));
        assert!(!Value::Int(3).is(ObjectId::from_index(3)));
    }

    #[test]
    fn primitives_have_no_identity() {
        assert_eq!(Value::from(42).object_id(), None);
        assert_eq!(Value::from("x").object_id(), None);
        assert!(Value::default().is_none());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Ref(ObjectId::from_index(7)).to_string(), "<object #7>");
    }
}
