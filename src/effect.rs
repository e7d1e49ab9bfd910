//! [`Effect`]: a subscriber that re-runs a closure whenever one of its deps changes (§4.3).
//!
//! An effect runs once immediately on creation (to discover its initial deps), then again every
//! time `notify` reaches it through a flush, unless a custom scheduler takes over the "when do I
//! actually run" decision (used by higher-level collaborators like a render scheduler).

use std::rc::Rc;

use crate::error::ReactiveError;
use crate::graph::{Root, SubId};
use crate::scope;
use crate::subscriber::{self, Flags};

/// Configuration for [`create_effect_with`].
#[derive(Default)]
pub struct EffectOptions {
    /// Runs instead of the default "run immediately" behavior when this effect is notified.
    /// Receiving the scheduler means the effect is NOT rerun automatically; the scheduler decides
    /// if/when to call [`Effect::run`].
    pub scheduler: Option<Rc<dyn Fn(SubId)>>,
    /// If `true`, a write that happens while this effect's own run is in flight is allowed to
    /// re-notify it instead of being silently absorbed (§4.3 edge case: effect writes a signal it
    /// also reads).
    pub allow_recurse: bool,
    /// Runs once, when the effect is stopped.
    pub on_stop: Option<Box<dyn FnOnce()>>,
}

/// A live effect handle. Dropping this does not stop the effect — effects are owned by the graph
/// (or by an [`crate::scope::EffectScope`](crate::EffectScope)), not by their handle, matching the
/// teacher's node-handle-is-a-reference convention.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Effect {
    pub(crate) id: SubId,
}

/// Create and immediately run an effect with default options.
pub fn create_effect(f: impl FnMut() + 'static) -> Effect {
    create_effect_with(f, EffectOptions::default())
}

/// Create and immediately run an effect, with an explicit scheduler/recursion/stop policy.
pub fn create_effect_with(f: impl FnMut() + 'static, options: EffectOptions) -> Effect {
    Root::with(|root| {
        let scope = root.scope_stack.borrow().last().copied();
        let id = subscriber::new_effect(root, Box::new(f), options.scheduler, scope);
        subscriber::set_flag(root, id, Flags::ALLOW_RECURSE, options.allow_recurse);
        if let Some(on_stop) = options.on_stop {
            subscriber::push_cleanup(root, id, Box::new(move || on_stop()));
        }
        scope::attach_current_effect(root, id);
        let initial_run = subscriber::run_effect(root, id);
        let effect = Effect { id };
        if let Err(payload) = initial_run {
            std::panic::resume_unwind(payload);
        }
        effect
    })
}

impl Effect {
    /// Re-run this effect's closure right now, outside of the batch/notify machinery. Panics
    /// propagate to the caller directly (no first-error aggregation, since there is no flush).
    pub fn run(self) {
        Root::with(|root| {
            if let Err(payload) = subscriber::run_effect(root, self.id) {
                std::panic::resume_unwind(payload);
            }
        });
    }

    /// Unsubscribe from every dep, run pending cleanups and the `on_stop` hook, and remove this
    /// effect from the graph. Running it again is not possible; create a new one instead.
    pub fn stop(self) {
        Root::with(|root| subscriber::dispose(root, self.id));
    }

    /// Suspend reruns until [`Effect::resume`] is called; a notification that arrives while paused
    /// is remembered (via DIRTY) rather than dropped.
    pub fn pause(self) {
        Root::with(|root| subscriber::set_flag(root, self.id, Flags::PAUSED, true));
    }

    /// Resume a paused effect. If it was notified while paused, it reruns immediately.
    pub fn resume(self) {
        Root::with(|root| {
            subscriber::set_flag(root, self.id, Flags::PAUSED, false);
            if subscriber::has_flag(root, self.id, Flags::DIRTY) {
                let _ = subscriber::run_effect(root, self.id);
            }
        });
    }
}

/// Register `f` to run once the currently running effect stops or re-runs (§4.6). Returns an
/// error rather than panicking, since a collaborator may call this speculatively without being
/// certain an effect is active.
pub fn on_effect_cleanup(f: impl FnOnce() + 'static) -> Result<(), ReactiveError> {
    Root::with(|root| {
        let Some(sub) = root.active_sub.get() else {
            #[cfg(all(feature = "trace", debug_assertions))]
            tracing::warn!("on_effect_cleanup called with no active effect");
            return Err(ReactiveError::NoActiveEffect);
        };
        subscriber::push_cleanup(root, sub, Box::new(f));
        Ok(())
    })
}
