//! Testing utilities for refpatch workspace
//!
//! Shared object-graph fixtures and tracing setup.

#![allow(missing_docs)]

use refpatch_graph::{Heap, ObjectId, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn new_heap() -> Arc<Heap> {
    Arc::new(Heap::new())
}

/// `module1.module_func` returning 42, re-exported by `module2`
///
/// ```text
/// module1: module_func() -> 42
/// module2: rose_by_any_other_name = module1.module_func
///          calls_module_func() -> module1.module_func()
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ModuleScenario {
    pub module1: ObjectId,
    pub module2: ObjectId,
    pub module_func: ObjectId,
}

impl ModuleScenario {
    pub fn build(heap: &Heap) -> Self {
        let module1 = heap.new_module("module1");
        let module2 = heap.new_module("module2");
        let module_func = heap
            .define_function(module1, "module_func", Some(0), |_, _| Ok(Value::Int(42)))
            .unwrap();
        heap.set_attr(module2, "rose_by_any_other_name", module_func)
            .unwrap();
        heap.define_function(module2, "calls_module_func", Some(0), move |heap, _| {
            heap.call_method(module1, "module_func", &[])
        })
        .unwrap();

        Self {
            module1,
            module2,
            module_func,
        }
    }

    pub fn module_func(&self, heap: &Heap) -> Value {
        heap.call_method(self.module1, "module_func", &[]).unwrap()
    }

    pub fn rose_by_any_other_name(&self, heap: &Heap) -> Value {
        heap.call_method(self.module2, "rose_by_any_other_name", &[])
            .unwrap()
    }

    pub fn calls_module_func(&self, heap: &Heap) -> Value {
        heap.call_method(self.module2, "calls_module_func", &[]).unwrap()
    }

    /// Results of all three entry points, in declaration order
    pub fn results(&self, heap: &Heap) -> [Value; 3] {
        [
            self.module_func(heap),
            self.rose_by_any_other_name(heap),
            self.calls_module_func(heap),
        ]
    }
}

/// Type `name` with a method `bar(self) -> "bar"`
///
/// Returns the type and the function published as `bar`.
pub fn class_with_bar(heap: &Heap, name: &str) -> (ObjectId, ObjectId) {
    let class = heap.new_type(name, &[]).unwrap();
    let bar = heap
        .define_function(class, "bar", Some(1), |_, _| Ok(Value::from("bar")))
        .unwrap();
    (class, bar)
}

/// A timestamp singleton held by two module names and a slotted instance
///
/// ```text
/// test_module: dt, dt_additional_ref = dt
///              get_dt() -> [dt, dt_additional_ref]
/// ClassWithSlots(__slots__ = ("dt",)): instance_with_slots.dt = dt
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DatetimeScenario {
    pub module: ObjectId,
    pub dt: ObjectId,
    pub slotted_class: ObjectId,
    pub instance_with_slots: ObjectId,
}

impl DatetimeScenario {
    pub fn build(heap: &Heap) -> Self {
        let module = heap.new_module("test_module");
        let dt = heap.new_opaque("datetime", "datetime(2000, 1, 1)");
        heap.set_attr(module, "dt", dt).unwrap();
        heap.set_attr(module, "dt_additional_ref", dt).unwrap();
        heap.define_function(module, "get_dt", Some(0), move |heap, _| {
            let first = heap.get_attr(module, "dt")?;
            let second = heap.get_attr(module, "dt_additional_ref")?;
            Ok(Value::Ref(heap.new_list(vec![first, second])))
        })
        .unwrap();

        let slotted_class = heap
            .new_slotted_type("ClassWithSlots", &[], &["dt"])
            .unwrap();
        let instance_with_slots = heap.instantiate(slotted_class).unwrap();
        heap.set_attr(module, "instance_with_slots", instance_with_slots)
            .unwrap();
        heap.set_attr(instance_with_slots, "dt", dt).unwrap();

        Self {
            module,
            dt,
            slotted_class,
            instance_with_slots,
        }
    }

    /// Items returned by `test_module.get_dt()`
    pub fn get_dt(&self, heap: &Heap) -> Vec<Value> {
        let list = heap.call_method(self.module, "get_dt", &[]).unwrap();
        heap.list_items(list.object_id().unwrap()).unwrap()
    }

    pub fn module_dt(&self, heap: &Heap) -> Value {
        heap.get_attr(self.module, "dt").unwrap()
    }

    pub fn slot_dt(&self, heap: &Heap) -> Value {
        heap.get_attr(self.instance_with_slots, "dt").unwrap()
    }
}
