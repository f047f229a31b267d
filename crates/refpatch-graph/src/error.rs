//! Error types for the object graph
//!
//! Covers the attribute protocol (lookup, assignment, deletion, slots) and the
//! call protocol (callability, arity, raised side effects).

use crate::object::ObjectKind;
use crate::value::ObjectId;

/// Errors raised by [`Heap`](crate::Heap) operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Id does not name a live object
    #[error("unknown object {0} (never allocated or already collected)")]
    UnknownObject(ObjectId),

    /// Object exists but is of the wrong kind for the operation
    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        /// Offending object
        id: ObjectId,
        /// Kind the operation needs
        expected: ObjectKind,
        /// Kind actually found
        actual: ObjectKind,
    },

    /// Attribute lookup or deletion found nothing
    #[error("{owner} has no attribute '{name}'")]
    AttributeNotFound {
        /// Description of the object searched
        owner: String,
        /// Attribute name
        name: String,
    },

    /// Assignment to a name the slotted type does not declare
    #[error("'{type_name}' declares no slot '{name}'")]
    NotASlot {
        /// Name of the slotted type
        type_name: String,
        /// Rejected slot name
        name: String,
    },

    /// Object does not support attribute assignment
    #[error("cannot set attribute '{name}' on {owner}")]
    ReadOnly {
        /// Description of the object
        owner: String,
        /// Attribute name
        name: String,
    },

    /// Call target is not callable
    #[error("{0} is not callable")]
    NotCallable(String),

    /// Wrong number of positional arguments
    #[error("{callee} takes {expected} argument(s) but {actual} were given")]
    ArityMismatch {
        /// Description of the callee
        callee: String,
        /// Declared arity
        expected: usize,
        /// Arguments supplied
        actual: usize,
    },

    /// A callee raised (native error or configured side effect)
    #[error("raised: {0}")]
    Raised(String),
}

impl GraphError {
    /// Build an attribute-not-found error
    pub fn attribute_not_found(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AttributeNotFound {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// True if this is a missing-attribute failure
    #[inline]
    #[must_use]
    pub fn is_missing_attribute(&self) -> bool {
        matches!(self, Self::AttributeNotFound { .. })
    }
}
