//! Batched flush (§4.5): `start_batch`/`end_batch` nest, and only the outermost `end_batch` drains
//! the queued effects and clears queued computeds' `NOTIFIED` flag.
//!
//! Computeds never run eagerly during a flush — they stay lazy and simply lose their `NOTIFIED`
//! flag so a later read re-triggers dirty-checking. Effects run in FIFO queue order (oldest
//! notified first), each either through its scheduler (if it has one) or by running directly.
//! A panicking effect does not stop the rest of the flush from running; the first panic wins and
//! is re-raised via [`std::panic::resume_unwind`] once every queued effect has had a turn, mirroring
//! the teacher's "run everything, report the first failure" batching.

use crate::graph::{Root, SubId};
use crate::subscriber;

pub(crate) fn start_batch_on(root: &Root) {
    root.batch_depth.set(root.batch_depth.get() + 1);
}

pub(crate) fn end_batch_on(root: &Root) {
    let depth = root.batch_depth.get().saturating_sub(1);
    root.batch_depth.set(depth);
    if depth == 0 {
        flush(root);
    }
}

/// Run `f` inside a batch: every `trigger()` call during `f` is queued rather than run
/// immediately, and the queue flushes once when `f` returns.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    crate::graph::Root::with(start_batch_on);
    let result = f();
    crate::graph::Root::with(end_batch_on);
    result
}

/// Open a batch: every `trigger()` call until the matching [`end_batch`] is queued rather than run
/// immediately. Nests; only the outermost matching `end_batch` flushes. Prefer [`batch`] for a
/// single closure — this pair exists for integrations that need to straddle a batch across more
/// than one call (e.g. an event-loop turn), where a closure can't express the boundary.
pub fn start_batch() {
    crate::graph::Root::with(start_batch_on);
}

/// Close a batch opened with [`start_batch`]. Flushes the queue once the nesting depth returns to
/// zero.
pub fn end_batch() {
    crate::graph::Root::with(end_batch_on);
}

fn flush(root: &Root) {
    let mut cursor = root.batched_computed.take();
    while let Some(sub) = cursor {
        cursor = subscriber::take_next_batched(root, sub);
        subscriber::clear_notified(root, sub);
    }

    let mut first_panic: Option<Box<dyn std::any::Any + Send>> = None;
    let mut cursor = root.batched_effects.take();
    while let Some(sub) = cursor {
        cursor = subscriber::take_next_batched(root, sub);
        run_queued_effect(root, sub, &mut first_panic);
    }

    if let Some(payload) = first_panic {
        std::panic::resume_unwind(payload);
    }
}

fn run_queued_effect(root: &Root, sub: SubId, first_panic: &mut Option<Box<dyn std::any::Any + Send>>) {
    if !subscriber::has_flag(root, sub, subscriber::Flags::ACTIVE) {
        return;
    }
    subscriber::clear_notified(root, sub);

    if let Some(scheduler) = subscriber::scheduler_of(root, sub) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler(sub)));
        if let Err(payload) = result {
            if first_panic.is_none() {
                *first_panic = Some(payload);
            }
        }
        return;
    }

    let result = subscriber::run_effect(root, sub);
    if let Err(payload) = result {
        if first_panic.is_none() {
            *first_panic = Some(payload);
        }
    }
}
