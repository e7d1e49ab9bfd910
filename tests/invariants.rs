//! Property-based checks for the graph's core invariants (§8): an effect's live dependency set is
//! exactly what it read on its most recent run, and batching collapses any number of triggers
//! into at most one rerun per affected subscriber.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use reactive_graph_core::{batch, create_effect, Dep};

/// For a random sequence of trigger calls against a fixed set of deps, an effect that only ever
/// tracks deps in `watched` must rerun exactly once per trigger call that hits a watched dep
/// (outside of any batch), and not at all for triggers against the rest.
proptest! {
    #[test]
    fn rerun_count_matches_watched_trigger_count(
        watched_count in 1usize..4,
        unwatched_count in 0usize..4,
        ops in prop::collection::vec(any::<(bool, usize)>(), 0..40),
    ) {
        let watched: Vec<Dep> = (0..watched_count).map(|_| Dep::new()).collect();
        let unwatched: Vec<Dep> = (0..unwatched_count).map(|_| Dep::new()).collect();

        let runs = Rc::new(Cell::new(0));
        let (watched_for_effect, runs_for_effect) = (watched.clone(), runs.clone());
        create_effect(move || {
            for dep in &watched_for_effect {
                dep.track();
            }
            runs_for_effect.set(runs_for_effect.get() + 1);
        });

        let mut expected = 1; // the initial run on creation
        for (pick_watched, index) in &ops {
            if *pick_watched {
                if watched_count > 0 {
                    watched[*index % watched_count].trigger();
                    expected += 1;
                }
            } else if unwatched_count > 0 {
                unwatched[*index % unwatched_count].trigger();
                // unwatched triggers must never cause a rerun
            }
        }

        prop_assert_eq!(runs.get(), expected);
    }
}

/// However many deps a batch triggers, an effect that reads more than one of them still reruns
/// exactly once when the batch ends.
proptest! {
    #[test]
    fn batch_collapses_any_number_of_triggers_to_one_rerun(dep_count in 1usize..6) {
        let deps: Vec<Dep> = (0..dep_count).map(|_| Dep::new()).collect();
        let runs = Rc::new(Cell::new(0));
        let (deps_for_effect, runs_for_effect) = (deps.clone(), runs.clone());
        create_effect(move || {
            for dep in &deps_for_effect {
                dep.track();
            }
            runs_for_effect.set(runs_for_effect.get() + 1);
        });
        prop_assert_eq!(runs.get(), 1);

        batch(|| {
            for dep in &deps {
                dep.trigger();
            }
        });

        prop_assert_eq!(runs.get(), 2);
    }
}
