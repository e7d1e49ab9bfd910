//! Batch-scheduler specific behavior: nesting, dedup, and first-error-wins during flush.

use std::cell::Cell;
use std::rc::Rc;

use reactive_graph_core::{batch, create_effect, end_batch, start_batch, Dep};

#[test]
fn nested_batches_only_flush_once_the_outermost_ends() {
    let dep = Dep::new();
    let runs = Rc::new(Cell::new(0));
    let (dep1, runs1) = (dep, runs.clone());
    create_effect(move || {
        dep1.track();
        runs1.set(runs1.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    batch(|| {
        batch(|| {
            dep.trigger();
        });
        // Still inside the outer batch: the effect must not have rerun yet.
        assert_eq!(runs.get(), 1);
        dep.trigger();
    });
    assert_eq!(runs.get(), 2, "one flush covering both triggers, once the outer batch ends");
}

#[test]
fn an_effect_notified_twice_in_one_batch_reruns_only_once() {
    let dep = Dep::new();
    let runs = Rc::new(Cell::new(0));
    let (dep1, runs1) = (dep, runs.clone());
    create_effect(move || {
        dep1.track();
        runs1.set(runs1.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    batch(|| {
        dep.trigger();
        dep.trigger();
        dep.trigger();
    });
    assert_eq!(runs.get(), 2);
}

#[test]
fn a_panicking_effect_does_not_stop_other_queued_effects_from_running() {
    let dep = Dep::new();
    let survivor_runs = Rc::new(Cell::new(0));

    let (dep1, survivor_runs1) = (dep, survivor_runs.clone());
    create_effect(move || {
        dep1.track();
        survivor_runs1.set(survivor_runs1.get() + 1);
    });

    let dep2 = dep;
    create_effect(move || {
        dep2.track();
        panic!("boom");
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        dep.trigger();
    }));
    assert!(result.is_err(), "the flush must re-raise the panic to the caller");
    assert_eq!(
        survivor_runs.get(),
        2,
        "the well-behaved effect must still have rerun despite its sibling panicking"
    );
}

#[test]
fn start_batch_and_end_batch_straddle_a_flush_like_the_batch_closure() {
    let dep = Dep::new();
    let runs = Rc::new(Cell::new(0));
    let (dep1, runs1) = (dep, runs.clone());
    create_effect(move || {
        dep1.track();
        runs1.set(runs1.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    start_batch();
    dep.trigger();
    dep.trigger();
    assert_eq!(runs.get(), 1, "the effect must not rerun before the matching end_batch");
    end_batch();
    assert_eq!(runs.get(), 2, "end_batch must flush the queued notification exactly once");
}
