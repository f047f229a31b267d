//! Method owner resolution
//!
//! Reduces "patch this method" to a by-name patch on the method's owner.
//! A bound method names its owner directly. An unbound function is traced
//! back through the referrer index: function -> member namespace -> type.

use crate::error::MockerError;
use refpatch_graph::{Heap, ObjectId, ObjectKind, Value};
use refpatch_patch::{PatchOptions, Patcher};

/// Finds the owner and attribute name of a method
#[derive(Debug, Clone)]
pub struct MethodResolver {
    patcher: Patcher,
}

impl MethodResolver {
    /// Create resolver issuing patches through `patcher`
    #[inline]
    #[must_use]
    pub fn new(patcher: Patcher) -> Self {
        Self { patcher }
    }

    /// Patch the attribute a method is published under
    ///
    /// Bound methods are patched on their receiver, so only that instance
    /// sees the substitute. Unbound functions are patched on the type that
    /// publishes them, affecting every instance.
    ///
    /// # Errors
    /// - [`MockerError::NotAMethod`] for values that are not functions or bound methods
    /// - [`MockerError::UnresolvableOwner`] if no type publishes the function
    /// - patch errors from the named-attribute primitive
    pub fn patch_method(&self, callable: &Value, options: &PatchOptions) -> Result<Value, MockerError> {
        let (owner, name) = self.resolve(callable)?;
        tracing::debug!(%owner, name = %name, "resolved method owner");
        self.patch_member(owner, &name, options)
    }

    /// Patch `owner.name` with the owner given explicitly
    ///
    /// # Errors
    /// Returns patch errors from the named-attribute primitive
    pub fn patch_member(
        &self,
        owner: ObjectId,
        name: &str,
        options: &PatchOptions,
    ) -> Result<Value, MockerError> {
        Ok(self.patcher.object(owner, name, options)?)
    }

    /// Owner and attribute name a method is published under
    ///
    /// # Errors
    /// See [`MethodResolver::patch_method`]
    pub fn resolve(&self, callable: &Value) -> Result<(ObjectId, String), MockerError> {
        let heap = self.patcher.heap();
        let not_a_method = || MockerError::NotAMethod(heap.describe(callable));
        let id = callable.object_id().ok_or_else(not_a_method)?;

        match heap.kind(id)? {
            ObjectKind::BoundMethod => bound_owner(heap, id).ok_or_else(not_a_method),
            ObjectKind::Function => {
                let name = heap.callable_name(id)?;
                let owner = owning_type(heap, id, &name)?
                    .ok_or_else(|| MockerError::UnresolvableOwner { name: name.clone() })?;
                Ok((owner, name))
            }
            _ => Err(not_a_method()),
        }
    }
}

/// Receiver and declared name of a bound method
///
/// `None` if the receiver is a primitive.
pub(crate) fn bound_owner(heap: &Heap, bound: ObjectId) -> Option<(ObjectId, String)> {
    let (receiver, function) = heap.bound_method_parts(bound).ok()?;
    let owner = receiver.object_id()?;
    let name = heap.callable_name(function).ok()?;
    Some((owner, name))
}

/// Type whose member table publishes `function` as `name`
///
/// Only types whose attribute lookup of `name` yields exactly `function`
/// qualify. If several do, the first in referrer order wins.
fn owning_type(heap: &Heap, function: ObjectId, name: &str) -> Result<Option<ObjectId>, MockerError> {
    let mut owners: Vec<ObjectId> = Vec::new();

    for members in heap.referrers(function) {
        if heap.kind(members)? != ObjectKind::Namespace {
            continue;
        }
        for holder in heap.referrers(members) {
            if owners.contains(&holder) || heap.kind(holder)? != ObjectKind::Type {
                continue;
            }
            if heap.lookup_type_attr(holder, name)? == Some(Value::Ref(function)) {
                owners.push(holder);
            }
        }
    }

    if owners.len() > 1 {
        let candidates: Vec<String> = owners.iter().map(|o| heap.describe(&Value::Ref(*o))).collect();
        tracing::warn!(
            function = name,
            candidates = ?candidates,
            "method is published by several types; patching the first"
        );
    }
    Ok(owners.first().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refpatch_patch::PatchSession;
    use std::sync::Arc;

    fn resolver() -> (Arc<Heap>, MethodResolver) {
        let heap = Arc::new(Heap::new());
        let patcher = Patcher::new(Arc::new(PatchSession::new(Arc::clone(&heap))));
        (heap, MethodResolver::new(patcher))
    }

    #[test]
    fn unbound_resolves_to_defining_type() {
        let (heap, resolver) = resolver();
        let class = heap.new_type("Foo", &[]).unwrap();
        let bar = heap
            .define_function(class, "bar", Some(1), |_, _| Ok(Value::None))
            .unwrap();

        assert_eq!(resolver.resolve(&Value::Ref(bar)).unwrap(), (class, "bar".to_string()));
    }

    #[test]
    fn subclass_does_not_claim_inherited_method() {
        let (heap, resolver) = resolver();
        let base = heap.new_type("Base", &[]).unwrap();
        let bar = heap
            .define_function(base, "bar", Some(1), |_, _| Ok(Value::None))
            .unwrap();
        heap.new_type("Derived", &[base]).unwrap();

        assert_eq!(resolver.resolve(&Value::Ref(bar)).unwrap().0, base);
    }

    #[test]
    fn overridden_alias_is_not_an_owner() {
        let (heap, resolver) = resolver();
        let base = heap.new_type("Base", &[]).unwrap();
        let bar = heap
            .define_function(base, "bar", Some(1), |_, _| Ok(Value::None))
            .unwrap();
        // Publishes the same function under a different name
        let other = heap.new_type("Other", &[]).unwrap();
        heap.set_attr(other, "baz", bar).unwrap();

        assert_eq!(resolver.resolve(&Value::Ref(bar)).unwrap().0, base);
    }

    #[test]
    fn bound_resolves_to_receiver() {
        let (heap, resolver) = resolver();
        let class = heap.new_type("Foo", &[]).unwrap();
        heap.define_function(class, "bar", Some(1), |_, _| Ok(Value::None))
            .unwrap();
        let instance = heap.instantiate(class).unwrap();
        let bound = heap.get_attr(instance, "bar").unwrap();

        assert_eq!(resolver.resolve(&bound).unwrap(), (instance, "bar".to_string()));
    }

    #[test]
    fn module_function_is_unresolvable() {
        let (heap, resolver) = resolver();
        let module = heap.new_module("m");
        let f = heap
            .define_function(module, "module_func", Some(0), |_, _| Ok(Value::Int(42)))
            .unwrap();

        assert_eq!(
            resolver.resolve(&Value::Ref(f)),
            Err(MockerError::UnresolvableOwner {
                name: "module_func".into()
            })
        );
    }

    #[test]
    fn non_methods_rejected() {
        let (heap, resolver) = resolver();
        let opaque = heap.new_opaque("datetime", "2000-01-01");

        assert!(matches!(
            resolver.resolve(&Value::Int(3)),
            Err(MockerError::NotAMethod(_))
        ));
        assert!(matches!(
            resolver.resolve(&Value::Ref(opaque)),
            Err(MockerError::NotAMethod(_))
        ));
    }
}
