//! Session teardown: reverse order, no short-circuit, first failure reported.

use mockall::mock;
use pretty_assertions::assert_eq;
use refpatch_core::prelude::*;
use refpatch_core::{PatchError, Reversible};
use refpatch_test_utils::{init_tracing, new_heap, ModuleScenario};

mock! {
    pub Flaky {}

    impl Reversible for Flaky {
        fn start(&mut self, heap: &Heap) -> Result<(), PatchError>;
        fn stop(&mut self, heap: &Heap) -> Result<(), PatchError>;
        fn describe(&self) -> String;
    }
}

fn flaky(stop_result: Result<(), PatchError>) -> MockFlaky {
    let mut patch = MockFlaky::new();
    patch.expect_describe().returning(|| "flaky".to_string());
    patch.expect_start().times(1).returning(|_| Ok(()));
    patch
        .expect_stop()
        .times(1)
        .return_once(move |_| stop_result);
    patch
}

#[test]
fn failing_stop_does_not_block_other_restores() {
    init_tracing();
    let heap = new_heap();
    let scenario = ModuleScenario::build(&heap);
    let mocker = Mocker::new(heap.clone());

    mocker
        .object(scenario.module1, "module_func", &PatchOptions::new().with_return_value(1))
        .unwrap();
    mocker
        .start_patch(flaky(Err(PatchError::NotStarted("flaky".into()))))
        .unwrap();
    mocker
        .patch_references(
            &Value::Ref(scenario.module_func),
            &PatchOptions::new().with_return_value(2),
        )
        .unwrap();

    let err = mocker.stop_all().unwrap_err();
    assert_eq!(err.failed, 1);
    assert!(err.attempted >= 3);
    assert_eq!(*err.first, PatchError::NotStarted("flaky".into()));

    assert_eq!(
        scenario.results(&heap),
        [Value::Int(42), Value::Int(42), Value::Int(42)]
    );
    assert_eq!(mocker.active_patches(), 0);
}

#[test]
fn failing_start_is_never_registered() {
    let heap = new_heap();
    let mocker = Mocker::new(heap.clone());

    let mut patch = MockFlaky::new();
    patch.expect_describe().returning(|| "broken".to_string());
    patch
        .expect_start()
        .returning(|_| Err(PatchError::NotStarted("broken".into())));
    patch.expect_stop().never();

    assert!(mocker.start_patch(patch).is_err());
    assert_eq!(mocker.active_patches(), 0);
    mocker.stop_all().unwrap();
}

#[test]
fn drop_logs_and_swallows_teardown_failure() {
    init_tracing();
    let heap = new_heap();
    let module = heap.new_module("m");
    heap.set_attr(module, "x", 1).unwrap();
    {
        let mocker = Mocker::new(heap.clone());
        mocker
            .object(module, "x", &PatchOptions::new().with_new(2))
            .unwrap();
        mocker
            .start_patch(flaky(Err(PatchError::NotStarted("flaky".into()))))
            .unwrap();
    }
    assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(1));
}

#[test]
fn stacked_patches_unwind_to_the_original() {
    let heap = new_heap();
    let module = heap.new_module("m");
    heap.set_attr(module, "x", 1).unwrap();
    let mocker = Mocker::new(heap.clone());

    for value in 2..6 {
        mocker
            .object(module, "x", &PatchOptions::new().with_new(value))
            .unwrap();
    }
    assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(5));

    mocker.stop_all().unwrap();
    assert_eq!(heap.get_attr(module, "x").unwrap(), Value::Int(1));
}

#[test]
fn collection_does_not_break_teardown() {
    let heap = new_heap();
    let scenario = ModuleScenario::build(&heap);
    let mocker = Mocker::new(heap.clone());

    mocker
        .patch_references(&Value::Ref(scenario.module_func), &PatchOptions::new())
        .unwrap();
    heap.collect();

    mocker.stop_all().unwrap();
    assert_eq!(scenario.module_func(&heap), Value::Int(42));
}
