//! Aliasing coverage and exact restoration over randomly shaped graphs.

use proptest::prelude::*;
use refpatch_core::prelude::*;
use refpatch_test_utils::new_heap;

/// Where the target is held, besides the module that defines it
#[derive(Debug, Clone)]
struct Layout {
    module_aliases: usize,
    dict_instances: usize,
    slot_instances: usize,
    bystanders: usize,
}

fn layout() -> impl Strategy<Value = Layout> {
    (0usize..4, 0usize..4, 0usize..4, 0usize..4).prop_map(
        |(module_aliases, dict_instances, slot_instances, bystanders)| Layout {
            module_aliases,
            dict_instances,
            slot_instances,
            bystanders,
        },
    )
}

proptest! {
    #[test]
    fn every_alias_patched_and_restored(layout in layout()) {
        let heap = new_heap();
        let target = heap.new_opaque("datetime", "datetime(2000, 1, 1)");
        let module = heap.new_module("origin");
        heap.set_attr(module, "value", target).unwrap();

        let mut locations: Vec<(ObjectId, String)> = vec![(module, "value".to_string())];
        for i in 0..layout.module_aliases {
            let alias = heap.new_module(&format!("alias{i}"));
            heap.set_attr(alias, "value", target).unwrap();
            locations.push((alias, "value".to_string()));
        }

        let plain = heap.new_type("Plain", &[]).unwrap();
        for i in 0..layout.dict_instances {
            let instance = heap.instantiate(plain).unwrap();
            heap.set_attr(module, &format!("plain{i}"), instance).unwrap();
            heap.set_attr(instance, "held", target).unwrap();
            locations.push((instance, "held".to_string()));
        }

        let slotted = heap.new_slotted_type("Slotted", &[], &["held", "other"]).unwrap();
        for i in 0..layout.slot_instances {
            let instance = heap.instantiate(slotted).unwrap();
            heap.set_attr(module, &format!("slotted{i}"), instance).unwrap();
            heap.set_attr(instance, "held", target).unwrap();
            locations.push((instance, "held".to_string()));
        }

        let mut bystanders = Vec::new();
        for i in 0..layout.bystanders {
            let name = format!("bystander{i}");
            let value = heap.new_opaque("datetime", &name);
            heap.set_attr(module, &name, value).unwrap();
            bystanders.push((name, value));
        }

        let mocker = Mocker::new(heap.clone());
        let substitute = mocker
            .patch_references(&Value::Ref(target), &PatchOptions::new())
            .unwrap();

        for (holder, name) in &locations {
            prop_assert_eq!(heap.get_attr(*holder, name).unwrap(), substitute.clone());
        }
        for (name, value) in &bystanders {
            prop_assert_eq!(heap.get_attr(module, name).unwrap(), Value::Ref(*value));
        }

        mocker.stop_all().unwrap();

        for (holder, name) in &locations {
            prop_assert_eq!(heap.get_attr(*holder, name).unwrap(), Value::Ref(target));
        }
        for (name, value) in &bystanders {
            prop_assert_eq!(heap.get_attr(module, name).unwrap(), Value::Ref(*value));
        }
    }

    #[test]
    fn calls_recorded_once_per_alias_call(aliases in 1usize..5, calls in 1usize..4) {
        let heap = new_heap();
        let origin = heap.new_module("origin");
        let function = heap
            .define_function(origin, "f", Some(0), |_, _| Ok(Value::Int(42)))
            .unwrap();
        let mut modules = vec![origin];
        for i in 0..aliases {
            let alias = heap.new_module(&format!("alias{i}"));
            heap.set_attr(alias, "f", function).unwrap();
            modules.push(alias);
        }

        let mocker = Mocker::new(heap.clone());
        let mock = mocker
            .patch_references(&Value::Ref(function), &PatchOptions::new().with_return_value(0))
            .unwrap();

        for module in &modules {
            for _ in 0..calls {
                prop_assert_eq!(heap.call_method(*module, "f", &[]).unwrap(), Value::Int(0));
            }
        }
        prop_assert_eq!(
            heap.call_count(mock.object_id().unwrap()).unwrap(),
            modules.len() * calls
        );
    }
}
