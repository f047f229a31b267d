//! Heap object kinds
//!
//! Every object in a [`Heap`](crate::Heap) is one of the [`Object`] variants.
//! Storage comes in two shapes that matter to patching:
//! - keyed mappings ([`Namespace`]): modules, instance dictionaries and type
//!   member tables, open to arbitrary key insertion
//! - fixed slots ([`Storage::Slots`]): instances of a type that declares a
//!   closed set of named locations

use crate::error::GraphError;
use crate::heap::Heap;
use crate::mock::MockState;
use crate::value::{ObjectId, Value};
use indexmap::IndexMap;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// Native body of a [`Function`]
///
/// Receives the heap so the body can look names up at call time, which is how
/// indirect callers observe patched bindings.
pub type NativeFn = Arc<dyn Fn(&Heap, &[Value]) -> Result<Value, GraphError> + Send + Sync>;

/// Coarse classification used in diagnostics and kind checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Keyed mapping (module or plain namespace)
    Namespace,
    /// Type object
    Type,
    /// Instance of a type
    Instance,
    /// Plain function
    Function,
    /// Function bound to a receiver
    BoundMethod,
    /// Ordered sequence
    List,
    /// Opaque leaf value
    Opaque,
    /// Call-recording stand-in
    Mock,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Namespace => "namespace",
            Self::Type => "type",
            Self::Instance => "instance",
            Self::Function => "function",
            Self::BoundMethod => "bound method",
            Self::List => "list",
            Self::Opaque => "opaque value",
            Self::Mock => "mock",
        };
        f.write_str(s)
    }
}

/// Open key to value table
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub(crate) name: Option<String>,
    pub(crate) entries: IndexMap<String, Value>,
}

impl Namespace {
    /// Module name, if this namespace is a module
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys whose value is exactly `target`
    #[must_use]
    pub fn keys_holding(&self, target: ObjectId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is(target))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// A type: name, bases, member table and optional declared slots
#[derive(Debug, Clone)]
pub struct TypeObject {
    pub(crate) name: String,
    pub(crate) bases: Vec<ObjectId>,
    pub(crate) members: ObjectId,
    pub(crate) slots: Option<Vec<String>>,
}

impl TypeObject {
    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct bases in declaration order
    #[inline]
    #[must_use]
    pub fn bases(&self) -> &[ObjectId] {
        &self.bases
    }

    /// Namespace holding the type's members
    #[inline]
    #[must_use]
    pub fn members(&self) -> ObjectId {
        self.members
    }

    /// Slots declared directly on this type
    #[inline]
    #[must_use]
    pub fn slots(&self) -> Option<&[String]> {
        self.slots.as_deref()
    }
}

/// Where an instance keeps its own attributes
#[derive(Debug, Clone)]
pub enum Storage {
    /// Dynamic attribute dictionary (a [`Namespace`] object)
    Dict(ObjectId),

    /// Closed set of named slots, unset slots are `None`
    Slots(IndexMap<String, Option<Value>>),
}

/// Instance of a type
#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) class: ObjectId,
    pub(crate) storage: Storage,
}

impl Instance {
    /// The instance's type
    #[inline]
    #[must_use]
    pub fn class(&self) -> ObjectId {
        self.class
    }

    /// Own attribute storage
    #[inline]
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

/// Function with a native body
#[derive(Clone)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) arity: Option<usize>,
    pub(crate) body: NativeFn,
}

impl Function {
    /// Declared name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional arity, `None` for variadic
    #[inline]
    #[must_use]
    pub fn arity(&self) -> Option<usize> {
        self.arity
    }
}

impl Debug for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Callable paired with the receiver it was looked up on
///
/// Created fresh on every attribute access through an instance, never stored
/// by the heap itself.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub(crate) receiver: Value,
    pub(crate) function: ObjectId,
}

impl BoundMethod {
    /// The receiver (`self`)
    #[inline]
    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    /// The underlying callable
    #[inline]
    #[must_use]
    pub fn function(&self) -> ObjectId {
        self.function
    }
}

/// Leaf value with identity but no attributes (a timestamp, a handle, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub(crate) type_name: String,
    pub(crate) repr: String,
}

impl Opaque {
    /// Name of the value's type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Printable representation
    #[inline]
    #[must_use]
    pub fn repr(&self) -> &str {
        &self.repr
    }
}

/// Heap object
#[derive(Debug, Clone)]
pub enum Object {
    /// Keyed mapping
    Namespace(Namespace),
    /// Type object
    Type(TypeObject),
    /// Instance
    Instance(Instance),
    /// Function
    Function(Function),
    /// Bound method
    BoundMethod(BoundMethod),
    /// Ordered sequence
    List(Vec<Value>),
    /// Opaque leaf
    Opaque(Opaque),
    /// Mock
    Mock(MockState),
}

impl Object {
    /// Kind of this object
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Namespace(_) => ObjectKind::Namespace,
            Self::Type(_) => ObjectKind::Type,
            Self::Instance(_) => ObjectKind::Instance,
            Self::Function(_) => ObjectKind::Function,
            Self::BoundMethod(_) => ObjectKind::BoundMethod,
            Self::List(_) => ObjectKind::List,
            Self::Opaque(_) => ObjectKind::Opaque,
            Self::Mock(_) => ObjectKind::Mock,
        }
    }

    /// Visit every object this one references directly
    ///
    /// Called once per reference, so an object holding the same target twice
    /// visits it twice. The back-reference index counts on that.
    pub(crate) fn for_each_ref(&self, mut visit: impl FnMut(ObjectId)) {
        let mut value = |v: &Value| {
            if let Value::Ref(id) = v {
                visit(*id);
            }
        };
        match self {
            Self::Namespace(ns) => ns.entries.values().for_each(&mut value),
            Self::Type(t) => {
                value(&Value::Ref(t.members));
                t.bases.iter().for_each(|b| value(&Value::Ref(*b)));
            }
            Self::Instance(inst) => {
                value(&Value::Ref(inst.class));
                match &inst.storage {
                    Storage::Dict(dict) => value(&Value::Ref(*dict)),
                    Storage::Slots(slots) => slots.values().flatten().for_each(&mut value),
                }
            }
            Self::BoundMethod(bm) => {
                value(&bm.receiver);
                value(&Value::Ref(bm.function));
            }
            Self::List(items) => items.iter().for_each(&mut value),
            Self::Mock(mock) => mock.for_each_value(&mut value),
            Self::Function(_) | Self::Opaque(_) => {}
        }
    }
}
