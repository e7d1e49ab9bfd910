//! The typed failure modes a caller can hit without panicking (§7), plus the one failure mode
//! (§7 "Cyclic dependency") that is a panic by design rather than a `Result`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reactive_graph_core::{
    create_effect, create_memo, create_writable_computed, on_effect_cleanup, ReactiveError,
};

#[test]
fn writing_a_readonly_computed_reports_readonly_computed() {
    let memo = create_memo(|| 42);
    assert_eq!(memo.try_set(7), Err(ReactiveError::ReadonlyComputed));
    assert!(!memo.is_writable());
}

#[test]
fn writing_a_writable_computed_succeeds_and_is_visible_on_the_next_read() {
    let storage = Rc::new(RefCell::new(1));
    let (storage_r, storage_w) = (storage.clone(), storage.clone());
    let computed = create_writable_computed(move || *storage_r.borrow(), move |v| *storage_w.borrow_mut() = v);

    assert!(computed.is_writable());
    assert_eq!(computed.try_set(99), Ok(()));
    assert_eq!(*storage.borrow(), 99);
}

#[test]
fn cleanup_hook_outside_any_effect_reports_no_active_effect() {
    assert_eq!(on_effect_cleanup(|| {}), Err(ReactiveError::NoActiveEffect));
}

#[test]
fn cleanup_hook_inside_an_effect_succeeds() {
    let registered = Rc::new(Cell::new(false));
    let registered2 = registered.clone();
    create_effect(move || {
        let result = on_effect_cleanup(|| {});
        registered2.set(result.is_ok());
    });
    assert!(registered.get());
}

#[test]
fn computed_that_reads_itself_mid_refresh_panics_with_cyclic_dependency() {
    let self_ref: Rc<RefCell<Option<reactive_graph_core::Computed<i32>>>> =
        Rc::new(RefCell::new(None));
    let self_ref_for_get = self_ref.clone();
    let memo = create_memo(move || {
        if let Some(m) = self_ref_for_get.borrow().as_ref() {
            m.get();
        }
        1
    });
    *self_ref.borrow_mut() = Some(memo.clone());

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| memo.get()));
    let err = result.expect_err("a computed revisiting itself while RUNNING must panic");
    let message = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .expect("panic payload should be a string");
    assert_eq!(message, ReactiveError::CyclicDependency.to_string());
}
