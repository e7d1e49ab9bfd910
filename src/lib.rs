//! A fine-grained reactive dependency graph.
//!
//! This crate is the engine room of a reactivity system, not the system itself: it tracks which
//! [`Effect`]s and [`Computed`]s read which reactive sources, and re-runs exactly the right
//! subscribers — and nothing else — when a source changes. What it deliberately does not do is
//! intercept property access; a collaborator (a `Signal<T>`, a reactive `Vec`, a proxy over some
//! external object graph) owns that decision and drives this crate through two entry points:
//!
//! - [`Dep`] for a single, unkeyed reactive source a collaborator owns outright.
//! - [`track`]/[`trigger`] for a collaborator fronting many keyed properties on one object (the
//!   dispatch rules a `CLEAR`, an array length shrink, or a `Map` key add each need are
//!   implemented once, here, instead of in every collaborator).
//!
//! Everything else — [`Effect`], [`Computed`], [`EffectScope`], [`batch`] — is the graph's own
//! subscriber side: how work gets scheduled once a source fires.
//!
//! The graph itself lives behind a thread-local [`graph::Root`]; nothing in this crate is
//! `Send`/`Sync`, matching its single-threaded, cooperative execution model.

#![warn(missing_docs)]

mod batch;
mod computed;
mod dep;
mod effect;
mod error;
mod graph;
mod link;
mod registry;
mod scope;
mod subscriber;

pub use batch::{batch, end_batch, start_batch};
pub use computed::{create_memo, create_writable_computed, refresh_computed, Computed};
pub use dep::Dep;
pub use effect::{create_effect, create_effect_with, on_effect_cleanup, Effect, EffectOptions};
pub use error::ReactiveError;
pub use graph::{enable_tracking, pause_tracking, reset_tracking};
pub use registry::{
    register_target_kind, release_target, track, trigger, Key, Target, TargetKind, TrackOpType,
    TriggerOpType,
};
pub use scope::EffectScope;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn effect_reruns_when_its_dep_is_triggered() {
        let dep = Dep::new();
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        let dep2 = dep;
        create_effect(move || {
            dep2.track();
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);
        dep.trigger();
        assert_eq!(runs.get(), 2);
        dep.trigger();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_only_subscribes_to_deps_it_actually_reads() {
        let a = Dep::new();
        let b = Dep::new();
        let read_b = Rc::new(Cell::new(true));
        let runs = Rc::new(Cell::new(0));

        let (a2, b2, read_b2, runs2) = (a, b, read_b.clone(), runs.clone());
        create_effect(move || {
            a2.track();
            if read_b2.get() {
                b2.track();
            }
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        read_b.set(false);
        a.trigger();
        assert_eq!(runs.get(), 2);

        // b is no longer read, so triggering it must not rerun the effect.
        b.trigger();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn memo_recomputes_lazily_and_only_when_dirty() {
        let dep = Dep::new();
        let computes = Rc::new(Cell::new(0));
        let (dep2, computes2) = (dep, computes.clone());
        let value = Rc::new(Cell::new(1));
        let value2 = value.clone();
        let memo = create_memo(move || {
            dep2.track();
            computes2.set(computes2.get() + 1);
            value2.get()
        });

        assert_eq!(computes.get(), 0, "a memo must not compute before its first read");
        assert_eq!(memo.get(), 1);
        assert_eq!(computes.get(), 1);
        assert_eq!(memo.get(), 1);
        assert_eq!(computes.get(), 1, "a second read without a trigger must not recompute");

        value.set(2);
        dep.trigger();
        assert_eq!(memo.get(), 2);
        assert_eq!(computes.get(), 2);
    }

    #[test]
    fn writable_computed_routes_writes_through_its_setter() {
        let storage = Rc::new(RefCell::new(10));
        let dep = Dep::new();
        let (dep_r, storage_r) = (dep, storage.clone());
        let (dep_w, storage_w) = (dep, storage.clone());
        let computed = create_writable_computed(
            move || {
                dep_r.track();
                *storage_r.borrow()
            },
            move |v| {
                *storage_w.borrow_mut() = v;
                dep_w.trigger();
            },
        );

        assert_eq!(computed.get(), 10);
        computed.set(20);
        assert_eq!(computed.get(), 20);

        let readonly = create_memo(|| 1);
        assert_eq!(readonly.try_set(2), Err(ReactiveError::ReadonlyComputed));
    }

    #[test]
    fn batch_coalesces_multiple_triggers_into_one_rerun() {
        let a = Dep::new();
        let b = Dep::new();
        let runs = Rc::new(Cell::new(0));
        let (a2, b2, runs2) = (a, b, runs.clone());
        create_effect(move || {
            a2.track();
            b2.track();
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        batch(|| {
            a.trigger();
            b.trigger();
        });
        assert_eq!(runs.get(), 2, "both triggers inside one batch must cause exactly one rerun");
    }

    #[test]
    fn effect_scope_disposes_every_effect_it_owns() {
        let dep = Dep::new();
        let runs = Rc::new(Cell::new(0));
        let (dep2, runs2) = (dep, runs.clone());

        let scope = EffectScope::new();
        scope.run(|| {
            create_effect(move || {
                dep2.track();
                runs2.set(runs2.get() + 1);
            });
        });
        assert_eq!(runs.get(), 1);

        dep.trigger();
        assert_eq!(runs.get(), 2);

        scope.dispose();
        dep.trigger();
        assert_eq!(runs.get(), 2, "a disposed scope's effects must not rerun");
    }

    #[test]
    fn on_effect_cleanup_runs_before_the_next_rerun_and_on_stop() {
        let dep = Dep::new();
        let cleanups = Rc::new(Cell::new(0));
        let (dep2, cleanups2) = (dep, cleanups.clone());

        let effect = create_effect(move || {
            dep2.track();
            let cleanups3 = cleanups2.clone();
            on_effect_cleanup(move || cleanups3.set(cleanups3.get() + 1)).unwrap();
        });
        assert_eq!(cleanups.get(), 0);

        dep.trigger();
        assert_eq!(cleanups.get(), 1, "rerunning must clean up the previous run first");

        effect.stop();
        assert_eq!(cleanups.get(), 2, "stopping must run the last cleanup");
    }

    #[test]
    fn on_effect_cleanup_outside_an_effect_reports_an_error() {
        assert_eq!(on_effect_cleanup(|| {}), Err(ReactiveError::NoActiveEffect));
    }

    #[test]
    fn registry_get_is_independent_per_key() {
        let target = Target::allocate();
        let runs_a = Rc::new(Cell::new(0));
        let runs_b = Rc::new(Cell::new(0));
        let (runs_a2, runs_b2) = (runs_a.clone(), runs_b.clone());

        create_effect(move || {
            track(target, Key::Named("a".into()), TrackOpType::Get);
            runs_a2.set(runs_a2.get() + 1);
        });
        create_effect(move || {
            track(target, Key::Named("b".into()), TrackOpType::Get);
            runs_b2.set(runs_b2.get() + 1);
        });
        assert_eq!((runs_a.get(), runs_b.get()), (1, 1));

        trigger(target, TriggerOpType::Set, Some(Key::Named("a".into())), None);
        assert_eq!((runs_a.get(), runs_b.get()), (2, 1));
    }

    #[test]
    fn registry_add_notifies_the_iterate_sentinel() {
        let target = Target::allocate();
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        create_effect(move || {
            track(target, Key::Iterate, TrackOpType::Iterate);
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        trigger(
            target,
            TriggerOpType::Add,
            Some(Key::Named("new-key".into())),
            None,
        );
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn registry_array_length_shrink_notifies_dropped_indices() {
        let target = Target::allocate();
        register_target_kind(target, TargetKind::Array);
        let runs = Rc::new(Cell::new(0));
        let runs2 = runs.clone();
        create_effect(move || {
            track(target, Key::Index(5), TrackOpType::Get);
            runs2.set(runs2.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        trigger(target, TriggerOpType::Set, Some(Key::Length), Some(2));
        assert_eq!(runs.get(), 2, "shrinking below index 5 must notify its dep");
    }
}
