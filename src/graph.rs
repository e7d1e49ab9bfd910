//! The [`Root`]: process-wide arenas and mutable state for the reactive graph.
//!
//! Everything in this crate is single-threaded and cooperative (see `SPEC_FULL.md` §5), so the
//! graph lives behind a `thread_local!` rather than behind locks or atomics. [`Root::with`]
//! mirrors the teacher's `Root::global()` / `GLOBAL_ROOT` pattern but hands out a borrow instead
//! of a leaked `&'static Root`: a single root per thread, with all nodes addressed through stable
//! [`slotmap`] keys instead of raw pointers.

use std::cell::{Cell, RefCell};

use slotmap::{new_key_type, SlotMap};

use crate::dep::DepNode;
use crate::link::Link;
use crate::registry::TargetMap;
use crate::scope::ScopeNode;
use crate::subscriber::SubNode;

new_key_type! {
    /// Stable handle to a [`DepNode`] in the arena.
    pub struct DepId;
    /// Stable handle to a [`SubNode`] (an `Effect` or `Computed`) in the arena.
    pub struct SubId;
    /// Stable handle to a [`Link`] edge in the arena.
    pub struct LinkId;
    /// Stable handle to an [`ScopeNode`](crate::scope::ScopeNode) in the arena.
    pub struct ScopeId;
}

/// All process-wide reactive state. Only one exists per thread; obtained via [`Root::with`].
pub(crate) struct Root {
    pub deps: RefCell<SlotMap<DepId, DepNode>>,
    pub subs: RefCell<SlotMap<SubId, SubNode>>,
    pub links: RefCell<SlotMap<LinkId, Link>>,
    pub scopes: RefCell<SlotMap<ScopeId, ScopeNode>>,

    pub registry: TargetMap,

    /// GlobalVersion (§3): bumped on every `trigger`, never decreases.
    pub global_version: Cell<u64>,

    /// The Subscriber currently executing, if any.
    pub active_sub: Cell<Option<SubId>>,
    /// Whether `track()` calls should record an edge right now. A stack so that
    /// `pause_tracking`/`enable_tracking`/`reset_tracking` nest correctly.
    pub should_track: Cell<bool>,
    pub track_stack: RefCell<Vec<bool>>,

    /// Batch nesting depth; `trigger`/flush only runs real work when this returns to zero.
    pub batch_depth: Cell<u32>,
    /// Head of the singly-linked list of Effects queued for the next flush.
    pub batched_effects: Cell<Option<SubId>>,
    /// Head of the singly-linked list of Computeds queued for the next flush.
    pub batched_computed: Cell<Option<SubId>>,

    /// Stack of active `EffectScope`s; the top is the owner of any `Effect` created right now.
    pub scope_stack: RefCell<Vec<ScopeId>>,
}

thread_local! {
    static GLOBAL_ROOT: Root = Root::new();
}

impl Root {
    fn new() -> Self {
        Self {
            deps: RefCell::new(SlotMap::with_key()),
            subs: RefCell::new(SlotMap::with_key()),
            links: RefCell::new(SlotMap::with_key()),
            scopes: RefCell::new(SlotMap::with_key()),
            registry: TargetMap::default(),
            global_version: Cell::new(0),
            active_sub: Cell::new(None),
            should_track: Cell::new(true),
            track_stack: RefCell::new(Vec::new()),
            batch_depth: Cell::new(0),
            batched_effects: Cell::new(None),
            batched_computed: Cell::new(None),
            scope_stack: RefCell::new(Vec::new()),
        }
    }

    /// Run `f` with the thread's [`Root`]. There is exactly one root per thread; this never
    /// panics.
    pub fn with<R>(f: impl FnOnce(&Root) -> R) -> R {
        GLOBAL_ROOT.with(f)
    }
}

/// Suspend tracking: reads that happen before the matching [`enable_tracking`] or
/// [`reset_tracking`] do not create new Links, even inside an active Effect or Computed run. Calls
/// nest via `track_stack` (§6 `pause_tracking`).
pub fn pause_tracking() {
    Root::with(|root| {
        root.track_stack.borrow_mut().push(root.should_track.get());
        root.should_track.set(false);
    });
}

/// Force tracking on, the inverse of [`pause_tracking`] for code that wants to track inside an
/// otherwise paused region. Nests the same way via `track_stack`.
pub fn enable_tracking() {
    Root::with(|root| {
        root.track_stack.borrow_mut().push(root.should_track.get());
        root.should_track.set(true);
    });
}

/// Pop the most recently pushed tracking-enabled state and restore it, undoing the most recent
/// unmatched [`pause_tracking`]/[`enable_tracking`] call. A no-op if the stack is empty.
pub fn reset_tracking() {
    Root::with(|root| {
        if let Some(prev) = root.track_stack.borrow_mut().pop() {
            root.should_track.set(prev);
        }
    });
}
