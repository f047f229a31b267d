//! The live object graph
//!
//! [`Heap`] owns every object, implements the attribute and call protocols,
//! and keeps the [`ReferrerIndex`] current on every store. Objects stay live
//! until [`Heap::collect`] frees those unreachable from the root set and
//! from pinned objects.

use crate::error::GraphError;
use crate::mock::{MockState, SideEffect};
use crate::object::{
    BoundMethod, Function, Instance, Namespace, NativeFn, Object, ObjectKind, Opaque, Storage,
    TypeObject,
};
use crate::referrers::ReferrerIndex;
use crate::value::{ObjectId, Value};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Shared, internally locked object arena
///
/// All methods take `&self`. No lock is held while a native function body
/// runs, so bodies may freely call back into the heap.
///
/// Nothing is freed implicitly. Every method read through an instance
/// allocates a bound method, and these accumulate in the arena and the
/// referrer index until [`Heap::collect`] runs.
#[derive(Debug, Default)]
pub struct Heap {
    inner: RwLock<HeapInner>,
}

#[derive(Debug, Default)]
struct HeapInner {
    objects: Vec<Option<Object>>,
    referrers: ReferrerIndex,
    roots: IndexSet<ObjectId>,
    pins: HashMap<ObjectId, usize>,
}

/// Where an attribute assignment or deletion lands
enum Store {
    Namespace(ObjectId),
    Slot,
    MockChild { allowed: bool },
    ReadOnly,
}

/// How a call is carried out, decided under the read lock
enum Dispatch {
    Native {
        body: NativeFn,
        arity: Option<usize>,
        name: String,
    },
    Bound {
        receiver: Value,
        function: ObjectId,
    },
    Construct,
    Mock,
}

/// Result of a mock call, computed before the index is touched
enum MockOutcome {
    Return(Value),
    Popped(Value),
    Child(String),
    Raise(String),
}

impl HeapInner {
    fn alloc(&mut self, object: Object) -> ObjectId {
        let id = ObjectId::from_index(self.objects.len());
        let referrers = &mut self.referrers;
        object.for_each_ref(|target| referrers.link(id, target));
        self.objects.push(Some(object));
        id
    }

    fn get(&self, id: ObjectId) -> Result<&Object, GraphError> {
        self.objects
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(GraphError::UnknownObject(id))
    }

    fn get_mut(&mut self, id: ObjectId) -> Result<&mut Object, GraphError> {
        self.objects
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownObject(id))
    }

    fn is_live(&self, id: ObjectId) -> bool {
        self.get(id).is_ok()
    }

    /// Move one reference of `holder` from `old` to `new`
    fn relink(&mut self, holder: ObjectId, old: Option<&Value>, new: Option<&Value>) {
        // link first so a holder re-storing the same target keeps its index position
        if let Some(Value::Ref(target)) = new {
            self.referrers.link(holder, *target);
        }
        if let Some(Value::Ref(target)) = old {
            self.referrers.unlink(holder, *target);
        }
    }

    fn kind_error(&self, id: ObjectId, expected: ObjectKind) -> GraphError {
        match self.get(id) {
            Ok(object) => GraphError::WrongKind {
                id,
                expected,
                actual: object.kind(),
            },
            Err(e) => e,
        }
    }

    fn namespace(&self, id: ObjectId) -> Result<&Namespace, GraphError> {
        match self.get(id)? {
            Object::Namespace(ns) => Ok(ns),
            _ => Err(self.kind_error(id, ObjectKind::Namespace)),
        }
    }

    fn namespace_mut(&mut self, id: ObjectId) -> Result<&mut Namespace, GraphError> {
        if !matches!(self.get(id)?, Object::Namespace(_)) {
            return Err(self.kind_error(id, ObjectKind::Namespace));
        }
        match self.get_mut(id)? {
            Object::Namespace(ns) => Ok(ns),
            _ => Err(GraphError::UnknownObject(id)),
        }
    }

    fn type_object(&self, id: ObjectId) -> Result<&TypeObject, GraphError> {
        match self.get(id)? {
            Object::Type(t) => Ok(t),
            _ => Err(self.kind_error(id, ObjectKind::Type)),
        }
    }

    fn instance(&self, id: ObjectId) -> Result<&Instance, GraphError> {
        match self.get(id)? {
            Object::Instance(inst) => Ok(inst),
            _ => Err(self.kind_error(id, ObjectKind::Instance)),
        }
    }

    fn mock_mut(&mut self, id: ObjectId) -> Result<&mut MockState, GraphError> {
        if !matches!(self.get(id)?, Object::Mock(_)) {
            return Err(self.kind_error(id, ObjectKind::Mock));
        }
        match self.get_mut(id)? {
            Object::Mock(mock) => Ok(mock),
            _ => Err(GraphError::UnknownObject(id)),
        }
    }

    fn type_name(&self, id: ObjectId) -> String {
        self.type_object(id)
            .map_or_else(|_| id.to_string(), |t| t.name.clone())
    }

    fn describe(&self, id: ObjectId) -> String {
        match self.get(id) {
            Ok(Object::Namespace(ns)) => match &ns.name {
                Some(name) => format!("module '{name}'"),
                None => format!("namespace {id}"),
            },
            Ok(Object::Type(t)) => format!("type '{}'", t.name),
            Ok(Object::Instance(inst)) => {
                format!("'{}' instance {id}", self.type_name(inst.class))
            }
            Ok(Object::Function(f)) => format!("function '{}'", f.name),
            Ok(Object::BoundMethod(bm)) => format!(
                "bound method '{}'",
                self.callable_name(bm.function).unwrap_or_default()
            ),
            Ok(Object::List(_)) => format!("list {id}"),
            Ok(Object::Opaque(o)) => o.repr.clone(),
            Ok(Object::Mock(m)) => format!("mock '{}'", m.name),
            Err(_) => format!("<collected {id}>"),
        }
    }

    fn callable_name(&self, id: ObjectId) -> Result<String, GraphError> {
        match self.get(id)? {
            Object::Function(f) => Ok(f.name.clone()),
            Object::Mock(m) => Ok(m.name.rsplit('.').next().unwrap_or_default().to_string()),
            Object::BoundMethod(bm) => self.callable_name(bm.function),
            Object::Type(t) => Ok(t.name.clone()),
            _ => Err(self.kind_error(id, ObjectKind::Function)),
        }
    }

    fn ns_set(&mut self, id: ObjectId, key: &str, value: Value) -> Result<Option<Value>, GraphError> {
        let old = self
            .namespace_mut(id)?
            .entries
            .insert(key.to_string(), value.clone());
        self.relink(id, old.as_ref(), Some(&value));
        Ok(old)
    }

    fn ns_remove(&mut self, id: ObjectId, key: &str) -> Result<Option<Value>, GraphError> {
        let old = self.namespace_mut(id)?.entries.shift_remove(key);
        self.relink(id, old.as_ref(), None);
        Ok(old)
    }

    /// Depth-first, left-to-right resolution order; first occurrence wins
    fn mro(&self, id: ObjectId) -> Result<Vec<ObjectId>, GraphError> {
        let mut order = IndexSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !order.insert(current) {
                continue;
            }
            stack.extend(self.type_object(current)?.bases.iter().rev().copied());
        }
        Ok(order.into_iter().collect())
    }

    fn lookup_type_attr(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        for t in self.mro(id)? {
            let members = self.type_object(t)?.members;
            if let Some(value) = self.namespace(members)?.entries.get(name) {
                return Ok(Some(value.clone()));
            }
        }
        Ok(None)
    }

    /// True if a value found on a type binds to the instance it is read through
    fn binds(&self, value: &Value) -> bool {
        match value.object_id().map(|id| self.get(id)) {
            Some(Ok(Object::Function(_))) => true,
            Some(Ok(Object::Mock(m))) => m.spec.binds,
            _ => false,
        }
    }

    fn own_attr(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        Ok(match self.get(id)? {
            Object::Namespace(ns) => ns.entries.get(name).cloned(),
            Object::Type(t) => self.namespace(t.members)?.entries.get(name).cloned(),
            Object::Instance(inst) => match &inst.storage {
                Storage::Dict(dict) => self.namespace(*dict)?.entries.get(name).cloned(),
                Storage::Slots(slots) => slots.get(name).cloned().flatten(),
            },
            Object::Mock(m) => m.children.get(name).cloned(),
            _ => None,
        })
    }

    fn get_attr(&mut self, id: ObjectId, name: &str) -> Result<Value, GraphError> {
        if let Some(value) = self.own_attr(id, name)? {
            return Ok(value);
        }
        match self.get(id)? {
            Object::Type(_) => {
                if let Some(value) = self.lookup_type_attr(id, name)? {
                    return Ok(value);
                }
            }
            Object::Instance(inst) => {
                let class = inst.class;
                if let Some(value) = self.lookup_type_attr(class, name)? {
                    return Ok(match value {
                        Value::Ref(function) if self.binds(&value) => {
                            Value::Ref(self.alloc(Object::BoundMethod(BoundMethod {
                                receiver: Value::Ref(id),
                                function,
                            })))
                        }
                        other => other,
                    });
                }
            }
            Object::Mock(m) if m.spec.allows(name) => {
                let child_name = format!("{}.{name}", m.name);
                let child = self.alloc(Object::Mock(MockState::named(child_name)));
                self.mock_mut(id)?
                    .children
                    .insert(name.to_string(), Value::Ref(child));
                self.referrers.link(id, child);
                return Ok(Value::Ref(child));
            }
            _ => {}
        }
        Err(GraphError::attribute_not_found(self.describe(id), name))
    }

    fn store_target(&self, id: ObjectId, name: &str) -> Result<Store, GraphError> {
        Ok(match self.get(id)? {
            Object::Namespace(_) => Store::Namespace(id),
            Object::Type(t) => Store::Namespace(t.members),
            Object::Instance(inst) => match &inst.storage {
                Storage::Dict(dict) => Store::Namespace(*dict),
                Storage::Slots(_) => Store::Slot,
            },
            Object::Mock(m) => Store::MockChild {
                allowed: m.spec.allows_set(name),
            },
            _ => Store::ReadOnly,
        })
    }

    fn set_attr(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), GraphError> {
        match self.store_target(id, name)? {
            Store::Namespace(ns) => {
                self.ns_set(ns, name, value)?;
            }
            Store::Slot => {
                self.set_slot(id, name, Some(value))?;
            }
            Store::MockChild { allowed: true } => {
                let old = self
                    .mock_mut(id)?
                    .children
                    .insert(name.to_string(), value.clone());
                self.relink(id, old.as_ref(), Some(&value));
            }
            Store::MockChild { allowed: false } => {
                return Err(GraphError::attribute_not_found(self.describe(id), name));
            }
            Store::ReadOnly => {
                return Err(GraphError::ReadOnly {
                    owner: self.describe(id),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn del_attr(&mut self, id: ObjectId, name: &str) -> Result<Value, GraphError> {
        let removed = match self.store_target(id, name)? {
            Store::Namespace(ns) => self.ns_remove(ns, name)?,
            Store::Slot => self.set_slot(id, name, None)?,
            Store::MockChild { .. } => {
                let old = self.mock_mut(id)?.children.shift_remove(name);
                self.relink(id, old.as_ref(), None);
                old
            }
            Store::ReadOnly => {
                return Err(GraphError::ReadOnly {
                    owner: self.describe(id),
                    name: name.to_string(),
                });
            }
        };
        removed.ok_or_else(|| GraphError::attribute_not_found(self.describe(id), name))
    }

    fn slot_error(&self, id: ObjectId, name: &str) -> GraphError {
        match self.instance(id) {
            Ok(inst) => GraphError::NotASlot {
                type_name: self.type_name(inst.class),
                name: name.to_string(),
            },
            Err(e) => e,
        }
    }

    fn get_slot(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        match &self.instance(id)?.storage {
            Storage::Slots(slots) if slots.contains_key(name) => {
                Ok(slots.get(name).cloned().flatten())
            }
            _ => Err(self.slot_error(id, name)),
        }
    }

    fn set_slot(
        &mut self,
        id: ObjectId,
        name: &str,
        value: Option<Value>,
    ) -> Result<Option<Value>, GraphError> {
        let declared = matches!(
            &self.instance(id)?.storage,
            Storage::Slots(slots) if slots.contains_key(name)
        );
        if !declared {
            return Err(self.slot_error(id, name));
        }
        let old = match self.get_mut(id)? {
            Object::Instance(Instance {
                storage: Storage::Slots(slots),
                ..
            }) => slots
                .get_mut(name)
                .and_then(|slot| std::mem::replace(slot, value.clone())),
            _ => None,
        };
        self.relink(id, old.as_ref(), value.as_ref());
        Ok(old)
    }

    fn slot_names(&self, id: ObjectId) -> Result<Option<Vec<String>>, GraphError> {
        Ok(match self.get(id)? {
            Object::Instance(Instance {
                storage: Storage::Slots(slots),
                ..
            }) => Some(slots.keys().cloned().collect()),
            _ => None,
        })
    }

    fn new_type(
        &mut self,
        name: &str,
        bases: &[ObjectId],
        slots: Option<Vec<String>>,
    ) -> Result<ObjectId, GraphError> {
        for base in bases {
            self.type_object(*base)?;
        }
        let members = self.alloc(Object::Namespace(Namespace::default()));
        Ok(self.alloc(Object::Type(TypeObject {
            name: name.to_string(),
            bases: bases.to_vec(),
            members,
            slots,
        })))
    }

    fn instantiate(&mut self, class: ObjectId) -> Result<ObjectId, GraphError> {
        let storage = if self.type_object(class)?.slots.is_some() {
            let mut slots = IndexMap::new();
            for t in self.mro(class)? {
                for slot in self.type_object(t)?.slots.iter().flatten() {
                    slots.entry(slot.clone()).or_insert(None);
                }
            }
            Storage::Slots(slots)
        } else {
            Storage::Dict(self.alloc(Object::Namespace(Namespace::default())))
        };
        Ok(self.alloc(Object::Instance(Instance { class, storage })))
    }

    fn extend_with_members(
        &self,
        class: ObjectId,
        names: &mut IndexSet<String>,
    ) -> Result<(), GraphError> {
        for t in self.mro(class)? {
            let members = self.type_object(t)?.members;
            names.extend(self.namespace(members)?.entries.keys().cloned());
        }
        Ok(())
    }

    fn attribute_names(&self, id: ObjectId) -> Result<Vec<String>, GraphError> {
        let mut names = IndexSet::new();
        match self.get(id)? {
            Object::Namespace(ns) => names.extend(ns.entries.keys().cloned()),
            Object::Type(_) => self.extend_with_members(id, &mut names)?,
            Object::Instance(inst) => {
                match &inst.storage {
                    Storage::Dict(dict) => {
                        names.extend(self.namespace(*dict)?.entries.keys().cloned());
                    }
                    Storage::Slots(slots) => names.extend(slots.keys().cloned()),
                }
                self.extend_with_members(inst.class, &mut names)?;
            }
            Object::Mock(m) => names.extend(m.children.keys().cloned()),
            _ => {}
        }
        Ok(names.into_iter().collect())
    }

    fn call_mock(&mut self, id: ObjectId, args: &[Value]) -> Result<Value, GraphError> {
        let mock = self.mock_mut(id)?;
        if let Some(expected) = mock.spec.arity {
            if expected != args.len() {
                return Err(GraphError::ArityMismatch {
                    callee: format!("mock '{}'", mock.name),
                    expected,
                    actual: args.len(),
                });
            }
        }
        mock.calls.push(args.to_vec());
        let outcome = match &mut mock.side_effect {
            Some(SideEffect::Raise(message)) => MockOutcome::Raise(message.clone()),
            Some(SideEffect::Values(values)) => match values.pop_front() {
                Some(value) => MockOutcome::Popped(value),
                None => MockOutcome::Raise(format!("side effect of '{}' exhausted", mock.name)),
            },
            None => match &mock.return_value {
                Some(value) => MockOutcome::Return(value.clone()),
                None => MockOutcome::Child(format!("{}()", mock.name)),
            },
        };
        for arg in args {
            self.relink(id, None, Some(arg));
        }
        match outcome {
            MockOutcome::Return(value) => Ok(value),
            MockOutcome::Popped(value) => {
                self.relink(id, Some(&value), None);
                Ok(value)
            }
            MockOutcome::Raise(message) => Err(GraphError::Raised(message)),
            MockOutcome::Child(name) => {
                let child = self.alloc(Object::Mock(MockState::named(name)));
                self.mock_mut(id)?.return_value = Some(Value::Ref(child));
                self.referrers.link(id, child);
                Ok(Value::Ref(child))
            }
        }
    }

    /// Mark every live object reachable from `starts`, indexed by slot
    fn mark(&self, starts: impl IntoIterator<Item = ObjectId>) -> Vec<bool> {
        let mut marked = vec![false; self.objects.len()];
        let mut stack: Vec<ObjectId> = starts.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(Some(object)) = self.objects.get(id.index()) else {
                continue;
            };
            if std::mem::replace(&mut marked[id.index()], true) {
                continue;
            }
            object.for_each_ref(|target| stack.push(target));
        }
        marked
    }

    fn collect(&mut self) -> usize {
        let marked = self.mark(self.roots.iter().chain(self.pins.keys()).copied());

        let mut freed = 0;
        for (index, live) in marked.into_iter().enumerate() {
            if live {
                continue;
            }
            if let Some(object) = self.objects[index].take() {
                let holder = ObjectId::from_index(index);
                let referrers = &mut self.referrers;
                object.for_each_ref(|target| referrers.unlink(holder, target));
                self.referrers.forget(holder);
                freed += 1;
            }
        }
        freed
    }
}

impl Heap {
    /// Create empty heap
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction ----

    /// Allocate an unnamed, unrooted namespace
    #[must_use]
    pub fn new_namespace(&self) -> ObjectId {
        self.inner.write().alloc(Object::Namespace(Namespace::default()))
    }

    /// Allocate a module namespace and add it to the root set
    #[must_use]
    pub fn new_module(&self, name: &str) -> ObjectId {
        let mut inner = self.inner.write();
        let id = inner.alloc(Object::Namespace(Namespace {
            name: Some(name.to_string()),
            entries: IndexMap::new(),
        }));
        inner.roots.insert(id);
        id
    }

    /// Define a type whose instances carry a dynamic attribute dictionary
    ///
    /// # Errors
    /// Returns error if a base is not a type
    pub fn new_type(&self, name: &str, bases: &[ObjectId]) -> Result<ObjectId, GraphError> {
        self.inner.write().new_type(name, bases, None)
    }

    /// Define a type whose instances only have the declared slots (plus
    /// slots declared by slotted bases)
    ///
    /// # Errors
    /// Returns error if a base is not a type
    pub fn new_slotted_type(
        &self,
        name: &str,
        bases: &[ObjectId],
        slots: &[&str],
    ) -> Result<ObjectId, GraphError> {
        let slots = slots.iter().map(|s| (*s).to_string()).collect();
        self.inner.write().new_type(name, bases, Some(slots))
    }

    /// Allocate a function with a native body
    ///
    /// `arity` of `None` accepts any number of arguments.
    pub fn new_function<F>(&self, name: &str, arity: Option<usize>, body: F) -> ObjectId
    where
        F: Fn(&Heap, &[Value]) -> Result<Value, GraphError> + Send + Sync + 'static,
    {
        self.inner.write().alloc(Object::Function(Function {
            name: name.to_string(),
            arity,
            body: Arc::new(body),
        }))
    }

    /// Allocate a function and publish it as `owner.name`
    ///
    /// On a type this defines a method; on a module a module-level function.
    ///
    /// # Errors
    /// Returns error if `owner` does not accept attribute assignment
    pub fn define_function<F>(
        &self,
        owner: ObjectId,
        name: &str,
        arity: Option<usize>,
        body: F,
    ) -> Result<ObjectId, GraphError>
    where
        F: Fn(&Heap, &[Value]) -> Result<Value, GraphError> + Send + Sync + 'static,
    {
        let function = self.new_function(name, arity, body);
        self.set_attr(owner, name, function)?;
        Ok(function)
    }

    /// Allocate a list
    #[must_use]
    pub fn new_list(&self, items: Vec<Value>) -> ObjectId {
        self.inner.write().alloc(Object::List(items))
    }

    /// Allocate an opaque leaf value
    #[must_use]
    pub fn new_opaque(&self, type_name: &str, repr: &str) -> ObjectId {
        self.inner.write().alloc(Object::Opaque(Opaque {
            type_name: type_name.to_string(),
            repr: repr.to_string(),
        }))
    }

    /// Allocate a mock
    #[must_use]
    pub fn new_mock(&self, state: MockState) -> ObjectId {
        self.inner.write().alloc(Object::Mock(state))
    }

    /// Create an instance without running an initializer
    ///
    /// # Errors
    /// Returns error if `class` is not a type
    pub fn instantiate(&self, class: ObjectId) -> Result<ObjectId, GraphError> {
        self.inner.write().instantiate(class)
    }

    // ---- attribute protocol ----

    /// Attribute lookup: own storage first, then the type's resolution order
    ///
    /// Functions (and binding mocks) found on the type of an instance come
    /// back as a fresh bound method on every access. The bound method stays
    /// allocated until the next [`Heap::collect`] finds it unreachable.
    ///
    /// # Errors
    /// Returns [`GraphError::AttributeNotFound`] if nothing resolves
    pub fn get_attr(&self, id: ObjectId, name: &str) -> Result<Value, GraphError> {
        self.inner.write().get_attr(id, name)
    }

    /// The object's own value for `name`, ignoring its type and never binding
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn own_attr(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        self.inner.read().own_attr(id, name)
    }

    /// Assign `id.name = value` in the object's own storage
    ///
    /// # Errors
    /// Returns error for undeclared slots, spec-restricted mocks and objects
    /// without attribute storage
    pub fn set_attr(&self, id: ObjectId, name: &str, value: impl Into<Value>) -> Result<(), GraphError> {
        self.inner.write().set_attr(id, name, value.into())
    }

    /// Delete `name` from the object's own storage, returning the old value
    ///
    /// # Errors
    /// Returns [`GraphError::AttributeNotFound`] if the object has no own value
    pub fn del_attr(&self, id: ObjectId, name: &str) -> Result<Value, GraphError> {
        self.inner.write().del_attr(id, name)
    }

    /// Look `name` up along a type's resolution order without binding
    ///
    /// # Errors
    /// Returns error if `id` or one of its bases is not a type
    pub fn lookup_type_attr(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        self.inner.read().lookup_type_attr(id, name)
    }

    /// Resolution order of a type, the type itself first
    ///
    /// # Errors
    /// Returns error if `id` is not a type
    pub fn mro(&self, id: ObjectId) -> Result<Vec<ObjectId>, GraphError> {
        self.inner.read().mro(id)
    }

    /// Names visible on an object: own storage plus type members
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn attribute_names(&self, id: ObjectId) -> Result<Vec<String>, GraphError> {
        self.inner.read().attribute_names(id)
    }

    // ---- slots ----

    /// Declared slot names of a slotted instance, `None` for anything else
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn slot_names(&self, id: ObjectId) -> Result<Option<Vec<String>>, GraphError> {
        self.inner.read().slot_names(id)
    }

    /// Read a declared slot, `None` if unset
    ///
    /// # Errors
    /// Returns [`GraphError::NotASlot`] if the slot is not declared
    pub fn get_slot(&self, id: ObjectId, name: &str) -> Result<Option<Value>, GraphError> {
        self.inner.read().get_slot(id, name)
    }

    /// Write (or unset, with `None`) a declared slot, returning the old value
    ///
    /// # Errors
    /// Returns [`GraphError::NotASlot`] if the slot is not declared
    pub fn set_slot(
        &self,
        id: ObjectId,
        name: &str,
        value: Option<Value>,
    ) -> Result<Option<Value>, GraphError> {
        self.inner.write().set_slot(id, name, value)
    }

    // ---- namespaces ----

    /// Read one namespace entry
    ///
    /// # Errors
    /// Returns error if `id` is not a namespace
    pub fn namespace_get(&self, id: ObjectId, key: &str) -> Result<Option<Value>, GraphError> {
        Ok(self.inner.read().namespace(id)?.entries.get(key).cloned())
    }

    /// Insert or replace one namespace entry, returning the old value
    ///
    /// # Errors
    /// Returns error if `id` is not a namespace
    pub fn namespace_set(
        &self,
        id: ObjectId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, GraphError> {
        self.inner.write().ns_set(id, key, value.into())
    }

    /// Remove one namespace entry, returning the old value
    ///
    /// # Errors
    /// Returns error if `id` is not a namespace
    pub fn namespace_remove(&self, id: ObjectId, key: &str) -> Result<Option<Value>, GraphError> {
        self.inner.write().ns_remove(id, key)
    }

    /// Keys of a namespace whose value is exactly `target`
    ///
    /// # Errors
    /// Returns error if `id` is not a namespace
    pub fn namespace_keys_holding(
        &self,
        id: ObjectId,
        target: ObjectId,
    ) -> Result<Vec<String>, GraphError> {
        Ok(self.inner.read().namespace(id)?.keys_holding(target))
    }

    /// Snapshot of a namespace's entries
    ///
    /// # Errors
    /// Returns error if `id` is not a namespace
    pub fn namespace_entries(&self, id: ObjectId) -> Result<Vec<(String, Value)>, GraphError> {
        Ok(self
            .inner
            .read()
            .namespace(id)?
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    // ---- lists ----

    /// Snapshot of a list's items
    ///
    /// # Errors
    /// Returns error if `id` is not a list
    pub fn list_items(&self, id: ObjectId) -> Result<Vec<Value>, GraphError> {
        let inner = self.inner.read();
        match inner.get(id)? {
            Object::List(items) => Ok(items.clone()),
            _ => Err(inner.kind_error(id, ObjectKind::List)),
        }
    }

    /// Append to a list
    ///
    /// # Errors
    /// Returns error if `id` is not a list
    pub fn list_push(&self, id: ObjectId, value: impl Into<Value>) -> Result<(), GraphError> {
        let value = value.into();
        let mut inner = self.inner.write();
        match inner.get_mut(id)? {
            Object::List(items) => items.push(value.clone()),
            _ => return Err(inner.kind_error(id, ObjectKind::List)),
        }
        inner.relink(id, None, Some(&value));
        Ok(())
    }

    // ---- calls ----

    /// Call a value
    ///
    /// Functions run their body, bound methods prepend their receiver, types
    /// construct an instance (running `__init__` if defined) and mocks record
    /// the call.
    ///
    /// # Errors
    /// Returns [`GraphError::NotCallable`], [`GraphError::ArityMismatch`] or
    /// whatever the callee raises
    pub fn call(&self, callee: &Value, args: &[Value]) -> Result<Value, GraphError> {
        let Some(id) = callee.object_id() else {
            return Err(GraphError::NotCallable(callee.to_string()));
        };
        let dispatch = {
            let inner = self.inner.read();
            match inner.get(id)? {
                Object::Function(f) => Dispatch::Native {
                    body: Arc::clone(&f.body),
                    arity: f.arity,
                    name: f.name.clone(),
                },
                Object::BoundMethod(bm) => Dispatch::Bound {
                    receiver: bm.receiver.clone(),
                    function: bm.function,
                },
                Object::Type(_) => Dispatch::Construct,
                Object::Mock(_) => Dispatch::Mock,
                _ => return Err(GraphError::NotCallable(inner.describe(id))),
            }
        };

        match dispatch {
            Dispatch::Native { body, arity, name } => {
                if let Some(expected) = arity {
                    if expected != args.len() {
                        return Err(GraphError::ArityMismatch {
                            callee: format!("function '{name}'"),
                            expected,
                            actual: args.len(),
                        });
                    }
                }
                body(self, args)
            }
            Dispatch::Bound { receiver, function } => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(receiver);
                full.extend_from_slice(args);
                self.call(&Value::Ref(function), &full)
            }
            Dispatch::Construct => {
                let instance = self.instantiate(id)?;
                match self.lookup_type_attr(id, "__init__")? {
                    Some(init) => {
                        let mut full = Vec::with_capacity(args.len() + 1);
                        full.push(Value::Ref(instance));
                        full.extend_from_slice(args);
                        self.call(&init, &full)?;
                    }
                    None if !args.is_empty() => {
                        return Err(GraphError::ArityMismatch {
                            callee: self.describe(callee),
                            expected: 0,
                            actual: args.len(),
                        });
                    }
                    None => {}
                }
                Ok(Value::Ref(instance))
            }
            Dispatch::Mock => self.inner.write().call_mock(id, args),
        }
    }

    /// `obj.name(*args)`
    ///
    /// # Errors
    /// Returns lookup or call errors
    pub fn call_method(&self, id: ObjectId, name: &str, args: &[Value]) -> Result<Value, GraphError> {
        let callee = self.get_attr(id, name)?;
        self.call(&callee, args)
    }

    // ---- introspection ----

    /// Kind of a live object
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn kind(&self, id: ObjectId) -> Result<ObjectKind, GraphError> {
        Ok(self.inner.read().get(id)?.kind())
    }

    /// Run `f` against an object under the read lock
    ///
    /// `f` must not call back into the heap.
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn inspect<R>(&self, id: ObjectId, f: impl FnOnce(&Object) -> R) -> Result<R, GraphError> {
        Ok(f(self.inner.read().get(id)?))
    }

    /// True if `id` has not been collected
    #[must_use]
    pub fn is_live(&self, id: ObjectId) -> bool {
        self.inner.read().is_live(id)
    }

    /// Human-readable description for diagnostics
    #[must_use]
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::Ref(id) => self.inner.read().describe(*id),
            other => other.to_string(),
        }
    }

    /// Declared name of a function, mock, type or bound method's function
    ///
    /// # Errors
    /// Returns error for objects without a name
    pub fn callable_name(&self, id: ObjectId) -> Result<String, GraphError> {
        self.inner.read().callable_name(id)
    }

    /// Declared arity of a function
    ///
    /// # Errors
    /// Returns error if `id` is not a function
    pub fn function_arity(&self, id: ObjectId) -> Result<Option<usize>, GraphError> {
        let inner = self.inner.read();
        match inner.get(id)? {
            Object::Function(f) => Ok(f.arity),
            _ => Err(inner.kind_error(id, ObjectKind::Function)),
        }
    }

    /// Receiver and callable of a bound method
    ///
    /// # Errors
    /// Returns error if `id` is not a bound method
    pub fn bound_method_parts(&self, id: ObjectId) -> Result<(Value, ObjectId), GraphError> {
        let inner = self.inner.read();
        match inner.get(id)? {
            Object::BoundMethod(bm) => Ok((bm.receiver.clone(), bm.function)),
            _ => Err(inner.kind_error(id, ObjectKind::BoundMethod)),
        }
    }

    /// Number of live objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().objects.iter().flatten().count()
    }

    /// True if no object is live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---- referrers and roots ----

    /// Live objects holding a direct reference to `target`, in
    /// first-reference order
    #[must_use]
    pub fn referrers(&self, target: ObjectId) -> Vec<ObjectId> {
        let inner = self.inner.read();
        inner
            .referrers
            .referrers(target)
            .into_iter()
            .filter(|holder| inner.is_live(*holder))
            .collect()
    }

    /// Number of direct references from `holder` to `target`
    #[must_use]
    pub fn reference_count(&self, holder: ObjectId, target: ObjectId) -> usize {
        self.inner.read().referrers.count(holder, target)
    }

    /// Add an object to the root set
    ///
    /// # Errors
    /// Returns error if `id` is not live
    pub fn root(&self, id: ObjectId) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        inner.get(id)?;
        inner.roots.insert(id);
        Ok(())
    }

    /// Remove an object from the root set
    pub fn unroot(&self, id: ObjectId) -> bool {
        self.inner.write().roots.shift_remove(&id)
    }

    /// True if `id` is in the root set
    #[must_use]
    pub fn is_rooted(&self, id: ObjectId) -> bool {
        self.inner.read().roots.contains(&id)
    }

    /// Keep the object referenced by `value` alive until a matching
    /// [`Heap::unpin`]
    ///
    /// Pins nest and are counted separately from the root set. Primitives
    /// are ignored.
    pub fn pin(&self, value: &Value) {
        if let Some(id) = value.object_id() {
            *self.inner.write().pins.entry(id).or_insert(0) += 1;
        }
    }

    /// Release one pin taken by [`Heap::pin`]
    pub fn unpin(&self, value: &Value) {
        let Some(id) = value.object_id() else {
            return;
        };
        let mut inner = self.inner.write();
        if let Some(count) = inner.pins.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                inner.pins.remove(&id);
            }
        }
    }

    /// Number of outstanding pins on `id`
    #[must_use]
    pub fn pin_count(&self, id: ObjectId) -> usize {
        self.inner.read().pins.get(&id).copied().unwrap_or(0)
    }

    /// Objects reachable from the root set, without freeing anything
    ///
    /// Pinned objects are not starting points: a value displaced by a patch
    /// is kept alive but is no longer part of the program's graph.
    #[must_use]
    pub fn reachable_from_roots(&self) -> HashSet<ObjectId> {
        let inner = self.inner.read();
        inner
            .mark(inner.roots.iter().copied())
            .into_iter()
            .enumerate()
            .filter_map(|(index, live)| live.then(|| ObjectId::from_index(index)))
            .collect()
    }

    /// Free every object unreachable from the root set
    ///
    /// Returns the number of objects freed. Ids of freed objects become
    /// [`GraphError::UnknownObject`].
    pub fn collect(&self) -> usize {
        let freed = self.inner.write().collect();
        tracing::debug!(freed, "collected unreachable objects");
        freed
    }

    // ---- mocks ----

    /// Snapshot of a mock's state
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn mock_state(&self, id: ObjectId) -> Result<MockState, GraphError> {
        let inner = self.inner.read();
        match inner.get(id)? {
            Object::Mock(m) => Ok(m.clone()),
            _ => Err(inner.kind_error(id, ObjectKind::Mock)),
        }
    }

    /// Number of calls a mock has recorded
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn call_count(&self, id: ObjectId) -> Result<usize, GraphError> {
        self.mock_state(id).map(|m| m.call_count())
    }

    /// Arguments of every recorded call
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn mock_calls(&self, id: ObjectId) -> Result<Vec<Vec<Value>>, GraphError> {
        self.mock_state(id).map(|m| m.calls)
    }

    /// Replace a mock's return value
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn set_return_value(&self, id: ObjectId, value: impl Into<Value>) -> Result<(), GraphError> {
        let value = value.into();
        let mut inner = self.inner.write();
        let old = inner.mock_mut(id)?.return_value.replace(value.clone());
        inner.relink(id, old.as_ref(), Some(&value));
        Ok(())
    }

    /// Replace a mock's side effect
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn set_side_effect(&self, id: ObjectId, effect: Option<SideEffect>) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let mock = inner.mock_mut(id)?;
        let old = std::mem::replace(&mut mock.side_effect, effect.clone());
        if let Some(SideEffect::Values(values)) = &old {
            for value in values {
                inner.relink(id, Some(value), None);
            }
        }
        if let Some(SideEffect::Values(values)) = &effect {
            for value in values {
                inner.relink(id, None, Some(value));
            }
        }
        Ok(())
    }

    /// Forget recorded calls
    ///
    /// # Errors
    /// Returns error if `id` is not a mock
    pub fn reset_mock(&self, id: ObjectId) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let calls = std::mem::take(&mut inner.mock_mut(id)?.calls);
        for arg in calls.iter().flatten() {
            inner.relink(id, Some(arg), None);
        }
        Ok(())
    }
}
