//! Named-attribute patch primitive
//!
//! [`Patcher`] builds a substitute from [`PatchOptions`] and installs it with
//! a [`NamedAttributePatch`] or [`MappingPatch`] registered in the session.

use crate::error::PatchError;
use crate::options::{PatchOptions, Spec};
use crate::patch::{MappingPatch, NamedAttributePatch, Reversible};
use crate::session::PatchSession;
use indexmap::{IndexMap, IndexSet};
use refpatch_graph::{Heap, MockSpec, MockState, ObjectId, ObjectKind, Value};
use std::sync::Arc;

/// Entry point for by-name and by-key patches
#[derive(Debug, Clone)]
pub struct Patcher {
    session: Arc<PatchSession>,
}

impl Patcher {
    /// Create patcher registering into `session`
    #[inline]
    #[must_use]
    pub fn new(session: Arc<PatchSession>) -> Self {
        Self { session }
    }

    /// Session this patcher registers into
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Arc<PatchSession> {
        &self.session
    }

    /// Heap being patched
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<Heap> {
        self.session.heap()
    }

    /// Replace `target.attribute` for the rest of the session
    ///
    /// Returns the installed substitute.
    ///
    /// # Errors
    /// - [`PatchError::ConflictingOptions`] for invalid option combinations
    /// - [`PatchError::MissingAttribute`] if the attribute does not resolve
    ///   and `create` is not set
    /// - graph errors from building or installing the substitute
    pub fn object(
        &self,
        target: ObjectId,
        attribute: &str,
        options: &PatchOptions,
    ) -> Result<Value, PatchError> {
        options.validate()?;
        let heap = self.heap();

        let original = match heap.get_attr(target, attribute) {
            Ok(value) => Some(value),
            Err(e) if e.is_missing_attribute() => None,
            Err(e) => return Err(e.into()),
        };
        if original.is_none() && !options.create {
            return Err(PatchError::MissingAttribute {
                owner: heap.describe(&Value::Ref(target)),
                name: attribute.to_string(),
            });
        }

        let substitute = self.build_substitute(target, attribute, original.as_ref(), options)?;
        self.start_patch(NamedAttributePatch::new(target, attribute, substitute.clone()))?;
        Ok(substitute)
    }

    /// Set several keys of a namespace for the rest of the session
    ///
    /// Keys absent before the patch are removed again on teardown.
    ///
    /// # Errors
    /// Returns error if `mapping` is not a namespace
    pub fn dict(&self, mapping: ObjectId, entries: IndexMap<String, Value>) -> Result<(), PatchError> {
        self.start_patch(MappingPatch::new(mapping, entries))
    }

    /// Start any reversible patch and register it in the session
    ///
    /// # Errors
    /// Returns the patch's start error; nothing is registered
    pub fn start_patch(&self, patch: impl Reversible + 'static) -> Result<(), PatchError> {
        self.session.start(Box::new(patch))
    }

    fn build_substitute(
        &self,
        target: ObjectId,
        attribute: &str,
        original: Option<&Value>,
        options: &PatchOptions,
    ) -> Result<Value, PatchError> {
        let heap = self.heap();

        if let Some(new) = &options.new {
            return Ok(new.clone());
        }
        if let Some(factory) = &options.new_callable {
            return Ok(factory(heap)?);
        }

        let mut spec = MockSpec {
            spec_set: options.spec_set,
            ..MockSpec::default()
        };
        match &options.spec {
            Some(Spec::Names(names)) => spec.attributes = Some(names.iter().cloned().collect()),
            Some(Spec::Object(source)) => {
                spec.attributes = Some(heap.attribute_names(*source)?.into_iter().collect());
            }
            None => {}
        }
        if options.autospec {
            let original = original.ok_or_else(|| PatchError::MissingAttribute {
                owner: heap.describe(&Value::Ref(target)),
                name: attribute.to_string(),
            })?;
            self.autospec_from(target, original, &mut spec)?;
        }

        let mut state = MockState::named(options.name.as_deref().unwrap_or(attribute)).with_spec(spec);
        if let Some(value) = &options.return_value {
            state = state.with_return_value(value.clone());
        }
        if let Some(effect) = &options.side_effect {
            state = state.with_side_effect(effect.clone());
        }
        for (name, value) in &options.attributes {
            state = state.with_attribute(name.clone(), value.clone());
        }
        Ok(Value::Ref(heap.new_mock(state)))
    }

    /// Copy attribute names and call shape from the value being replaced
    fn autospec_from(
        &self,
        target: ObjectId,
        original: &Value,
        spec: &mut MockSpec,
    ) -> Result<(), PatchError> {
        let heap = self.heap();
        let Some(id) = original.object_id() else {
            spec.attributes = Some(IndexSet::new());
            return Ok(());
        };

        match heap.kind(id)? {
            ObjectKind::Function => {
                spec.attributes = Some(IndexSet::new());
                spec.arity = heap.function_arity(id)?;
                spec.binds = heap.kind(target)? == ObjectKind::Type;
            }
            ObjectKind::BoundMethod => {
                let (_, function) = heap.bound_method_parts(id)?;
                spec.attributes = Some(IndexSet::new());
                spec.arity = match heap.kind(function)? {
                    ObjectKind::Function => {
                        heap.function_arity(function)?.map(|n| n.saturating_sub(1))
                    }
                    _ => None,
                };
            }
            _ => spec.attributes = Some(heap.attribute_names(id)?.into_iter().collect()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use refpatch_graph::{GraphError, SideEffect};

    fn patcher() -> Patcher {
        Patcher::new(Arc::new(PatchSession::new(Arc::new(Heap::new()))))
    }

    #[test]
    fn default_substitute_is_named_mock() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");
        heap.define_function(module, "f", Some(0), |_, _| Ok(Value::Int(1)))
            .unwrap();

        let substitute = patcher
            .object(module, "f", &PatchOptions::new().with_return_value(7))
            .unwrap();
        let mock = substitute.object_id().unwrap();
        assert_eq!(heap.kind(mock).unwrap(), ObjectKind::Mock);
        assert_eq!(heap.mock_state(mock).unwrap().name(), "f");
        assert_eq!(heap.call_method(module, "f", &[]).unwrap(), Value::Int(7));
        assert_eq!(heap.call_count(mock).unwrap(), 1);
    }

    #[test]
    fn explicit_new_is_installed_as_is() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");
        heap.set_attr(module, "x", 1).unwrap();

        let substitute = patcher
            .object(module, "x", &PatchOptions::new().with_new("replaced"))
            .unwrap();
        assert_eq!(substitute, Value::from("replaced"));
        assert_eq!(heap.get_attr(module, "x").unwrap(), Value::from("replaced"));

        patcher.session().stop_all().unwrap();
        assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(1));
    }

    #[test]
    fn new_callable_builds_substitute() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");
        heap.set_attr(module, "x", 1).unwrap();

        let options =
            PatchOptions::new().with_new_callable(|heap| Ok(Value::Ref(heap.new_opaque("Fake", "fake"))));
        let substitute = patcher.object(module, "x", &options).unwrap();
        assert_eq!(
            heap.kind(substitute.object_id().unwrap()).unwrap(),
            ObjectKind::Opaque
        );
    }

    #[test]
    fn missing_attribute_requires_create() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");

        let err = patcher.object(module, "absent", &PatchOptions::new()).unwrap_err();
        assert!(err.is_missing_attribute());
        assert!(patcher.session().is_empty());

        patcher
            .object(module, "absent", &PatchOptions::new().with_create().with_new(3))
            .unwrap();
        assert_eq!(heap.get_attr(module, "absent").unwrap(), Value::Int(3));

        patcher.session().stop_all().unwrap();
        assert!(heap.get_attr(module, "absent").is_err());
    }

    #[test]
    fn class_patch_reaches_every_instance() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let class = heap.new_type("Foo", &[]).unwrap();
        heap.define_function(class, "bar", Some(1), |_, _| Ok(Value::from("real")))
            .unwrap();
        let before = heap.instantiate(class).unwrap();

        patcher
            .object(class, "bar", &PatchOptions::new().with_return_value(42))
            .unwrap();
        let after = heap.instantiate(class).unwrap();
        assert_eq!(heap.call_method(before, "bar", &[]).unwrap(), Value::Int(42));
        assert_eq!(heap.call_method(after, "bar", &[]).unwrap(), Value::Int(42));

        patcher.session().stop_all().unwrap();
        assert_eq!(heap.call_method(before, "bar", &[]).unwrap(), Value::from("real"));
    }

    #[test]
    fn autospec_on_class_method_binds_and_checks_arity() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let class = heap.new_type("Foo", &[]).unwrap();
        heap.define_function(class, "add", Some(2), |_, args| Ok(args[1].clone()))
            .unwrap();
        let instance = heap.instantiate(class).unwrap();

        let substitute = patcher
            .object(class, "add", &PatchOptions::new().with_autospec().with_return_value(0))
            .unwrap();
        assert_eq!(
            heap.call_method(instance, "add", &[Value::Int(5)]).unwrap(),
            Value::Int(0)
        );
        assert!(matches!(
            heap.call_method(instance, "add", &[]),
            Err(GraphError::ArityMismatch { .. })
        ));

        let calls = heap.mock_calls(substitute.object_id().unwrap()).unwrap();
        assert_eq!(calls, vec![vec![Value::Ref(instance), Value::Int(5)]]);
    }

    #[test]
    fn spec_restricts_mock_attributes() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");
        heap.set_attr(module, "client", Value::None).unwrap();

        let substitute = patcher
            .object(
                module,
                "client",
                &PatchOptions::new().with_spec(Spec::Names(vec!["send".into()])),
            )
            .unwrap();
        let mock = substitute.object_id().unwrap();
        assert!(heap.get_attr(mock, "send").is_ok());
        assert!(heap.get_attr(mock, "recv").unwrap_err().is_missing_attribute());
    }

    #[test]
    fn side_effect_and_configured_attributes() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("m");
        heap.set_attr(module, "f", Value::None).unwrap();

        let substitute = patcher
            .object(
                module,
                "f",
                &PatchOptions::new()
                    .with_side_effect(SideEffect::Raise("boom".into()))
                    .configure("version", 3),
            )
            .unwrap();
        let mock = substitute.object_id().unwrap();
        assert_eq!(heap.get_attr(mock, "version").unwrap(), Value::Int(3));
        assert_eq!(
            heap.call(&substitute, &[]),
            Err(GraphError::Raised("boom".into()))
        );
    }

    #[test]
    fn dict_patches_namespace_keys() {
        let patcher = patcher();
        let heap = patcher.heap().clone();
        let module = heap.new_module("config");
        heap.set_attr(module, "debug", false).unwrap();

        let entries = [
            ("debug".to_string(), Value::Bool(true)),
            ("extra".to_string(), Value::Int(1)),
        ]
        .into_iter()
        .collect();
        patcher.dict(module, entries).unwrap();
        assert_eq!(heap.get_attr(module, "debug").unwrap(), Value::Bool(true));

        patcher.session().stop_all().unwrap();
        assert_eq!(heap.get_attr(module, "debug").unwrap(), Value::Bool(false));
        assert!(heap.get_attr(module, "extra").is_err());
    }
}
