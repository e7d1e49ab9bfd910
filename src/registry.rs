//! The track/trigger registry: maps an external collaborator's `(target, key)` pairs onto
//! [`DepId`]s (§4.1).
//!
//! Nothing in this crate intercepts property access itself — that's explicitly the job of a
//! Proxy-like collaborator layered on top (`SPEC_FULL.md` §1 Non-goals). What lives here is the
//! dispatch table such a collaborator calls into: `track(target, key)` on every read, `trigger`
//! on every write, with the exact "which deps does this particular mutation touch" rules a
//! correct collaborator depends on.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::dep::{self, DepNode};
use crate::graph::{DepId, Root};

/// Opaque, stable identity for whatever object a collaborator is wrapping. Collaborators mint one
/// with [`Target::allocate`] when they start wrapping an object and call
/// [`TargetMap::release`] when that wrapper is dropped, since this crate has no way to observe
/// the wrapped object's lifetime itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Target(u64);

thread_local! {
    static NEXT_TARGET: Cell<u64> = const { Cell::new(1) };
}

impl Target {
    pub fn allocate() -> Target {
        NEXT_TARGET.with(|n| {
            let id = n.get();
            n.set(id + 1);
            Target(id)
        })
    }
}

/// The structural shape of a target, needed only to reproduce the dispatch rules below; this
/// crate never inspects the target itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetKind {
    Plain,
    Array,
    Map,
}

/// A key within a target's dependency map. The three `*_ITERATE` variants are sentinels a
/// collaborator tracks against instead of a real property when observing "shape" (iteration,
/// `in`, `size`) rather than one property's value.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    Named(Box<str>),
    Index(usize),
    Length,
    Iterate,
    MapKeyIterate,
    ArrayIterate,
}

/// What kind of read caused a `track()` call. Carried through for parity with the op-type the
/// original design threads through to debug hooks; this crate has no debugger glue (§1 Non-goals)
/// so it is otherwise inert.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackOpType {
    Get,
    Has,
    Iterate,
}

/// What kind of write caused a `trigger()` call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerOpType {
    Set,
    Add,
    Delete,
    Clear,
}

#[derive(Default)]
struct TargetEntry {
    kind_is_array: bool,
    kind_is_map: bool,
    deps: HashMap<Key, DepId>,
}

#[derive(Default)]
pub(crate) struct TargetMap {
    targets: RefCell<HashMap<Target, TargetEntry>>,
}

impl TargetMap {
    /// Declare `target`'s shape. Idempotent; a collaborator calls this once when it starts
    /// wrapping an object.
    pub fn register(&self, target: Target, kind: TargetKind) {
        let mut targets = self.targets.borrow_mut();
        let entry = targets.entry(target).or_default();
        entry.kind_is_array = kind == TargetKind::Array;
        entry.kind_is_map = kind == TargetKind::Map;
    }

    /// Make sure `target` has an entry, without touching its declared shape if it already has one.
    fn ensure_entry(&self, target: Target) {
        self.targets.borrow_mut().entry(target).or_default();
    }

    /// Drop all deps recorded for `target`. Called when a collaborator's wrapper is dropped,
    /// since nothing here can detect that on its own.
    pub fn release(&self, root: &Root, target: Target) {
        if let Some(entry) = self.targets.borrow_mut().remove(&target) {
            let mut deps = root.deps.borrow_mut();
            for dep in entry.deps.values() {
                deps.remove(*dep);
            }
        }
    }

    fn dep_for(&self, root: &Root, target: Target, key: &Key) -> DepId {
        let mut targets = self.targets.borrow_mut();
        let entry = targets.entry(target).or_default();
        if let Some(id) = entry.deps.get(key) {
            return *id;
        }
        let id = root.deps.borrow_mut().insert(DepNode::new(None));
        entry.deps.insert(key.clone(), id);
        id
    }

    fn existing_dep(&self, target: Target, key: &Key) -> Option<DepId> {
        self.targets
            .borrow()
            .get(&target)
            .and_then(|e| e.deps.get(key).copied())
    }
}

/// Declare `target`'s structural shape (array/map/plain), needed only so `trigger` can reproduce
/// the exact dispatch rules below. A collaborator calls this once, before the first `track`.
pub fn register_target_kind(target: Target, kind: TargetKind) {
    Root::with(|root| root.registry.register(target, kind));
}

/// Drop every dep recorded for `target`. Call this when the collaborator wrapping `target` is
/// dropped, since this crate cannot observe that on its own.
pub fn release_target(target: Target) {
    Root::with(|root| root.registry.release(root, target));
}

/// Record that `key` on `target` was read (or its shape was observed, for `Iterate`/`Has`). Every
/// read lazily allocates a [`DepId`] the first time it's seen (§4.1).
pub fn track(target: Target, key: Key, op: TrackOpType) {
    Root::with(|root| track_impl(root, target, key, op));
}

fn track_impl(root: &Root, target: Target, key: Key, _op: TrackOpType) {
    root.registry.ensure_entry(target);
    let dep = root.registry.dep_for(root, target, &key);
    dep::track(root, dep);
}

/// Record that `key` on `target` was written, reproducing the exact per-key dispatch the original
/// design specifies (§4.1): `CLEAR` notifies everything, an array length shrink notifies every
/// dropped index plus `length` and the array-iterate sentinel, and `ADD`/`DELETE`/`SET` notify the
/// exact key plus whichever iterate sentinel applies to the target's shape.
pub fn trigger(target: Target, op: TriggerOpType, key: Option<Key>, new_array_length: Option<usize>) {
    Root::with(|root| trigger_impl(root, target, op, key, new_array_length));
}

fn trigger_impl(
    root: &Root,
    target: Target,
    op: TriggerOpType,
    key: Option<Key>,
    new_array_length: Option<usize>,
) {
    root.registry.ensure_entry(target);
    let (is_array, is_map) = {
        let targets = root.registry.targets.borrow();
        match targets.get(&target) {
            Some(e) => (e.kind_is_array, e.kind_is_map),
            None => (false, false),
        }
    };

    let run = |k: &Key| {
        if let Some(dep) = root.registry.existing_dep(target, k) {
            dep::trigger(root, dep);
        }
    };

    if matches!(op, TriggerOpType::Clear) {
        let all: Vec<Key> = root
            .registry
            .targets
            .borrow()
            .get(&target)
            .map(|e| e.deps.keys().cloned().collect())
            .unwrap_or_default();
        for k in &all {
            run(k);
        }
        return;
    }

    if is_array {
        if let (Some(Key::Length), Some(new_len)) = (&key, new_array_length) {
            let all: Vec<Key> = root
                .registry
                .targets
                .borrow()
                .get(&target)
                .map(|e| e.deps.keys().cloned().collect())
                .unwrap_or_default();
            for k in &all {
                let affected = matches!(k, Key::Length)
                    || matches!(k, Key::ArrayIterate)
                    || matches!(k, Key::Index(i) if *i >= new_len);
                if affected {
                    run(k);
                }
            }
            return;
        }
    }

    let is_array_index = is_array && matches!(key, Some(Key::Index(_)));

    if let Some(k) = &key {
        run(k);
    }
    if is_array_index {
        run(&Key::ArrayIterate);
    }

    match op {
        TriggerOpType::Add => {
            if !is_array {
                run(&Key::Iterate);
                if is_map {
                    run(&Key::MapKeyIterate);
                }
            } else if is_array_index {
                run(&Key::Length);
            }
        }
        TriggerOpType::Delete => {
            if !is_array {
                run(&Key::Iterate);
                if is_map {
                    run(&Key::MapKeyIterate);
                }
            }
        }
        TriggerOpType::Set => {
            if is_map {
                run(&Key::Iterate);
            }
        }
        TriggerOpType::Clear => unreachable!("handled above"),
    }
}
