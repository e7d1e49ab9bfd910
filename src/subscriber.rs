//! [`SubNode`]: the "right half" of the graph, shared machinery for [`crate::effect::Effect`] and
//! [`crate::computed::Computed`] (§4.3, §4.4).
//!
//! Both kinds of subscriber own a dep list (the sources they last read) and a small flag bitset
//! that drives scheduling. A `Computed` additionally owns a [`DepId`] of its own, since reading a
//! computed's value is itself a trackable event for whoever reads it.

use crate::graph::{DepId, LinkId, Root, ScopeId, SubId};
use crate::link;

/// Hand-rolled bitset for subscriber state, kept dependency-free rather than pulling in a crate
/// for eight flags.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Flags(u16);

impl Flags {
    pub const ACTIVE: Flags = Flags(1 << 0);
    pub const RUNNING: Flags = Flags(1 << 1);
    pub const TRACKING: Flags = Flags(1 << 2);
    pub const NOTIFIED: Flags = Flags(1 << 3);
    pub const DIRTY: Flags = Flags(1 << 4);
    pub const ALLOW_RECURSE: Flags = Flags(1 << 5);
    pub const PAUSED: Flags = Flags(1 << 6);
    pub const EVALUATED: Flags = Flags(1 << 7);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }
    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }
}

pub(crate) struct SubscriberCommon {
    pub deps_head: Option<LinkId>,
    pub deps_tail: Option<LinkId>,
    pub flags: Flags,
    /// Next node in whichever singly-linked batch queue this subscriber is currently sitting in.
    pub next_batched: Option<SubId>,
    pub scope: Option<ScopeId>,
}

impl SubscriberCommon {
    fn new(scope: Option<ScopeId>) -> Self {
        Self {
            deps_head: None,
            deps_tail: None,
            flags: Flags::ACTIVE | Flags::TRACKING,
            next_batched: None,
            scope,
        }
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

pub(crate) struct EffectData {
    pub common: SubscriberCommon,
    pub run: Box<dyn FnMut()>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    pub scheduler: Option<std::rc::Rc<dyn Fn(SubId)>>,
}

pub(crate) struct ComputedData {
    pub common: SubscriberCommon,
    pub dep: DepId,
    /// Recomputes the memoized value in place and reports whether it changed. Boxed so
    /// [`crate::computed::Computed<T>`] can close over its own typed storage and comparator.
    pub refresh: Box<dyn FnMut(&Root) -> bool>,
}

pub(crate) enum SubNode {
    Effect(EffectData),
    Computed(ComputedData),
}

impl SubNode {
    pub(crate) fn common(&self) -> &SubscriberCommon {
        match self {
            SubNode::Effect(e) => &e.common,
            SubNode::Computed(c) => &c.common,
        }
    }
    pub(crate) fn common_mut(&mut self) -> &mut SubscriberCommon {
        match self {
            SubNode::Effect(e) => &mut e.common,
            SubNode::Computed(c) => &mut c.common,
        }
    }
}

pub(crate) fn new_effect(
    root: &Root,
    run: Box<dyn FnMut()>,
    scheduler: Option<std::rc::Rc<dyn Fn(SubId)>>,
    scope: Option<ScopeId>,
) -> SubId {
    root.subs.borrow_mut().insert(SubNode::Effect(EffectData {
        common: SubscriberCommon::new(scope),
        run,
        cleanups: Vec::new(),
        scheduler,
    }))
}

pub(crate) fn new_computed(root: &Root, dep: DepId, refresh: Box<dyn FnMut(&Root) -> bool>) -> SubId {
    let mut common = SubscriberCommon::new(None);
    common.flags.remove(Flags::EVALUATED);
    root.subs.borrow_mut().insert(SubNode::Computed(ComputedData {
        common,
        dep,
        refresh,
    }))
}

pub(crate) fn is_tracking(root: &Root, sub: SubId) -> bool {
    let subs = root.subs.borrow();
    let f = subs[sub].common().flags;
    f.contains(Flags::ACTIVE) && f.contains(Flags::TRACKING) && !f.contains(Flags::PAUSED)
}

pub(crate) fn dep_id_of(root: &Root, sub: SubId) -> Option<DepId> {
    match &root.subs.borrow()[sub] {
        SubNode::Computed(c) => Some(c.dep),
        SubNode::Effect(_) => None,
    }
}

pub(crate) fn scope_of(root: &Root, sub: SubId) -> Option<ScopeId> {
    root.subs.borrow()[sub].common().scope
}

/// Snapshot the link chain in access order (head → tail) so callers can iterate it without
/// holding the `subs` borrow.
pub(crate) fn dep_link_chain(root: &Root, sub: SubId) -> Vec<LinkId> {
    let mut out = Vec::new();
    let mut cursor = root.subs.borrow()[sub].common().deps_head;
    while let Some(link) = cursor {
        out.push(link);
        cursor = link::next_dep(root, link);
    }
    out
}

pub(crate) fn mark_dirty_and_notified(root: &Root, sub: SubId) {
    let mut subs = root.subs.borrow_mut();
    let common = subs[sub].common_mut();
    common.flags.insert(Flags::DIRTY | Flags::NOTIFIED);
}

/// Re-arm a Computed's TRACKING flag on regaining its first subscriber, the inverse of
/// `soft_unsubscribe_if_orphaned`'s clear. Must happen before `dep::add_sub`'s recursive
/// resubscribe cascade, since that cascade itself gates on `is_tracking(computed)`.
pub(crate) fn mark_tracking(root: &Root, sub: SubId) {
    let mut subs = root.subs.borrow_mut();
    subs[sub].common_mut().flags.insert(Flags::TRACKING);
}

/// Arm every dep this subscriber currently tracks for a fresh run: stamp `version = -1`,
/// temporarily install this link as `dep.active_link` so repeated reads of the same dep within
/// the run are recognized as reuses rather than brand-new edges (§4.2/§4.3).
pub(crate) fn prepare_deps(root: &Root, sub: SubId) {
    for link in dep_link_chain(root, sub) {
        let dep = link::link_dep(root, link);
        let prev_active = root.deps.borrow()[dep].active_link;
        link::set_prev_active_link(root, link, prev_active);
        root.deps.borrow_mut()[dep].active_link = Some(link);
        link::set_link_version(root, link, -1);
    }
}

/// After a run: drop any dep link that was not reused (still armed at `-1`), and restore each
/// dep's `active_link` to what it was before this run started (§4.2/§4.3).
pub(crate) fn cleanup_deps(root: &Root, sub: SubId) {
    for link in dep_link_chain(root, sub) {
        let dep = link::link_dep(root, link);
        let stale = link::link_version(root, link) == -1;
        let prev_active = link::take_prev_active_link(root, link);
        root.deps.borrow_mut()[dep].active_link = prev_active;
        if stale {
            if link::remove_sub(root, link) {
                soft_unsubscribe_if_orphaned(root, dep);
            }
            link::remove_dep(root, link);
            link::free_link(root, link);
        }
    }
}

/// A Dep's subscriber count just reached zero. If it belongs to a Computed, that Computed lost
/// its last reader: clear its TRACKING flag and cascade the same soft-unsubscribe into its own
/// upstream Links, mirroring `dep::add_sub`'s recursive re-subscribe cascade (§4.4 "Lazy Computed
/// subscription").
fn soft_unsubscribe_if_orphaned(root: &Root, dep: DepId) {
    let Some(computed) = root.deps.borrow()[dep].owner_computed else {
        return;
    };
    {
        let mut subs = root.subs.borrow_mut();
        subs[computed].common_mut().flags.remove(Flags::TRACKING);
    }
    for link in dep_link_chain(root, computed) {
        let upstream_dep = link::link_dep(root, link);
        if link::remove_sub(root, link) {
            soft_unsubscribe_if_orphaned(root, upstream_dep);
        }
    }
}

/// Dispatch a trigger-time notification to `sub`. Returns `true` if the dep this subscriber
/// itself feeds (a computed's own dep) should now also be notified — i.e. this subscriber was
/// being observed and just became dirty (§4.2 `Subscriber::notify`).
pub(crate) fn notify(root: &Root, sub: SubId) -> bool {
    let mut subs = root.subs.borrow_mut();
    match &mut subs[sub] {
        SubNode::Effect(e) => {
            if e.common.flags.contains(Flags::RUNNING) && !e.common.flags.contains(Flags::ALLOW_RECURSE) {
                return false;
            }
            if e.common.flags.contains(Flags::NOTIFIED) {
                return false;
            }
            if !e.common.flags.contains(Flags::ACTIVE) {
                return false;
            }
            e.common.flags.insert(Flags::DIRTY | Flags::NOTIFIED);
            if e.common.flags.contains(Flags::PAUSED) {
                return false;
            }
            e.common.next_batched = root.batched_effects.get();
            drop(subs);
            root.batched_effects.set(Some(sub));
            false
        }
        SubNode::Computed(c) => {
            if !c.common.flags.contains(Flags::TRACKING) || c.common.flags.contains(Flags::NOTIFIED) {
                return false;
            }
            c.common.flags.insert(Flags::DIRTY | Flags::NOTIFIED);
            c.common.next_batched = root.batched_computed.get();
            drop(subs);
            root.batched_computed.set(Some(sub));
            true
        }
    }
}

/// Dirty-check a computed: explicit `DIRTY` flag, never evaluated yet, or any dep's stamped
/// version no longer matches the dep's current version (refreshing upstream computeds along the
/// way, per §4.4).
pub(crate) fn is_dirty(root: &Root, sub: SubId) -> bool {
    {
        let subs = root.subs.borrow();
        let common = subs[sub].common();
        if common.flags.contains(Flags::DIRTY) || !common.flags.contains(Flags::EVALUATED) {
            return true;
        }
    }
    for link in dep_link_chain(root, sub) {
        let dep = link::link_dep(root, link);
        let owner = root.deps.borrow()[dep].owner_computed;
        if let Some(owner) = owner {
            if owner != sub {
                refresh_if_needed(root, owner);
            }
        }
        if link::link_version(root, link) != crate::dep::version_of(root, dep) as i64 {
            return true;
        }
    }
    false
}

/// Refresh `sub` (a computed) if it is dirty; returns whether the memoized value changed.
///
/// Panics with [`crate::error::ReactiveError::CyclicDependency`] if `sub`'s own refresh chain
/// revisits `sub` while it is still RUNNING, instead of recursing until the stack overflows.
pub(crate) fn refresh_if_needed(root: &Root, sub: SubId) -> bool {
    if has_flag(root, sub, Flags::RUNNING) {
        panic!("{}", crate::error::ReactiveError::CyclicDependency);
    }
    if !is_dirty(root, sub) {
        return false;
    }
    run_computed_refresh(root, sub)
}

fn run_computed_refresh(root: &Root, sub: SubId) -> bool {
    {
        let mut subs = root.subs.borrow_mut();
        let common = subs[sub].common_mut();
        common.flags.insert(Flags::RUNNING);
    }
    prepare_deps(root, sub);

    let prev_active = root.active_sub.replace(Some(sub));
    let prev_should_track = root.should_track.replace(true);

    let mut refresh_fn = {
        let mut subs = root.subs.borrow_mut();
        match &mut subs[sub] {
            SubNode::Computed(c) => std::mem::replace(&mut c.refresh, Box::new(|_| false)),
            SubNode::Effect(_) => unreachable!("run_computed_refresh called on an Effect"),
        }
    };
    let changed = refresh_fn(root);
    {
        let mut subs = root.subs.borrow_mut();
        if let SubNode::Computed(c) = &mut subs[sub] {
            c.refresh = refresh_fn;
        }
    }

    debug_assert_eq!(
        root.active_sub.get(),
        Some(sub),
        "active subscriber was not restored to the running computed before cleanup"
    );
    root.active_sub.set(prev_active);
    root.should_track.set(prev_should_track);

    cleanup_deps(root, sub);

    let own_dep = dep_id_of(root, sub);
    {
        let mut subs = root.subs.borrow_mut();
        let common = subs[sub].common_mut();
        common.flags.remove(Flags::RUNNING | Flags::DIRTY | Flags::NOTIFIED);
        common.flags.insert(Flags::EVALUATED);
    }
    if changed {
        if let Some(dep) = own_dep {
            root.deps.borrow_mut()[dep].version += 1;
        }
    }
    changed
}

/// Run `sub` (an Effect) exactly once, wiring and unwiring its dep list around the call. Returns
/// whatever the closure panicked with, if anything, so `batch::flush` can aggregate first-error.
pub(crate) fn run_effect(root: &Root, sub: SubId) -> std::thread::Result<()> {
    {
        let mut subs = root.subs.borrow_mut();
        let common = subs[sub].common_mut();
        common.flags.insert(Flags::RUNNING);
        common.flags.remove(Flags::DIRTY | Flags::NOTIFIED);
    }
    run_cleanups(root, sub);
    prepare_deps(root, sub);

    let prev_active = root.active_sub.replace(Some(sub));
    let prev_should_track = root.should_track.replace(true);

    let mut run_fn = {
        let mut subs = root.subs.borrow_mut();
        match &mut subs[sub] {
            SubNode::Effect(e) => std::mem::replace(&mut e.run, Box::new(|| {})),
            SubNode::Computed(_) => unreachable!("run_effect called on a Computed"),
        }
    };
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run_fn()));
    let self_stopped = {
        let mut subs = root.subs.borrow_mut();
        match subs.get_mut(sub) {
            Some(SubNode::Effect(e)) => {
                e.run = run_fn;
                false
            }
            // the closure called `Effect::stop()` on itself; the slot is already gone.
            _ => true,
        }
    };

    debug_assert!(
        self_stopped || root.active_sub.get() == Some(sub),
        "active subscriber was not restored to the running effect before cleanup"
    );
    root.active_sub.set(prev_active);
    root.should_track.set(prev_should_track);

    if self_stopped {
        return result;
    }

    cleanup_deps(root, sub);

    let mut subs = root.subs.borrow_mut();
    if let Some(node) = subs.get_mut(sub) {
        node.common_mut().flags.remove(Flags::RUNNING);
    }
    result
}

pub(crate) fn push_cleanup(root: &Root, sub: SubId, cleanup: Box<dyn FnOnce()>) {
    if let SubNode::Effect(e) = &mut root.subs.borrow_mut()[sub] {
        e.cleanups.push(cleanup);
    }
}

pub(crate) fn run_cleanups(root: &Root, sub: SubId) {
    let cleanups = match &mut root.subs.borrow_mut()[sub] {
        SubNode::Effect(e) => std::mem::take(&mut e.cleanups),
        SubNode::Computed(_) => return,
    };
    for cleanup in cleanups {
        cleanup();
    }
}

/// Unlink every dep this subscriber holds and remove it from the arena outright. A no-op if `sub`
/// is already gone, so [`crate::effect::Effect::stop`] stays idempotent across repeated calls
/// (§4.3).
pub(crate) fn dispose(root: &Root, sub: SubId) {
    if !root.subs.borrow().contains_key(sub) {
        return;
    }
    run_cleanups(root, sub);
    for link in dep_link_chain(root, sub) {
        let dep = link::link_dep(root, link);
        if link::remove_sub(root, link) {
            soft_unsubscribe_if_orphaned(root, dep);
        }
        link::remove_dep(root, link);
        link::free_link(root, link);
    }
    if let SubNode::Computed(c) = &root.subs.borrow()[sub] {
        let dep = c.dep;
        root.deps.borrow_mut().remove(dep);
    }
    root.subs.borrow_mut().remove(sub);
}

pub(crate) fn set_flag(root: &Root, sub: SubId, flag: Flags, on: bool) {
    let mut subs = root.subs.borrow_mut();
    let common = subs[sub].common_mut();
    if on {
        common.flags.insert(flag);
    } else {
        common.flags.remove(flag);
    }
}

pub(crate) fn has_flag(root: &Root, sub: SubId, flag: Flags) -> bool {
    root.subs.borrow()[sub].common().flags.contains(flag)
}

pub(crate) fn take_next_batched(root: &Root, sub: SubId) -> Option<SubId> {
    root.subs.borrow_mut()[sub].common_mut().next_batched.take()
}

pub(crate) fn clear_notified(root: &Root, sub: SubId) {
    root.subs.borrow_mut()[sub].common_mut().flags.remove(Flags::NOTIFIED);
}

pub(crate) fn scheduler_of(root: &Root, sub: SubId) -> Option<std::rc::Rc<dyn Fn(SubId)>> {
    match &root.subs.borrow()[sub] {
        SubNode::Effect(e) => e.scheduler.clone(),
        SubNode::Computed(_) => None,
    }
}
