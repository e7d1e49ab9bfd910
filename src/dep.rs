//! [`DepNode`]: a reactive source's bookkeeping (§4.2).
//!
//! A `DepNode` is the "left half" of the graph: a version counter and the tail of a doubly-linked
//! list of [`Link`](crate::link::Link)s to every [`SubId`] currently subscribed to it. Plain
//! signals own a `DepNode` outright; a [`crate::computed::Computed`] owns one too, since it is
//! simultaneously a dependency of whatever reads it and a subscriber of whatever it reads.

use crate::graph::{DepId, LinkId, Root, SubId};
use crate::link;
use crate::subscriber;

pub(crate) struct DepNode {
    /// Bumped on every `trigger`; subscribers compare a link's stamped version against this to
    /// decide whether the edge is stale.
    pub version: u64,
    /// Tail of the subscriber list; iterated head-to-tail via `prev_sub` during `notify`, which
    /// walks newest-to-oldest the same way the teacher's `mark_dependents_dirty` walks its `Vec`
    /// in reverse.
    pub subs_tail: Option<LinkId>,
    /// The link last used to track this dep against whichever subscriber is currently running,
    /// reset to `None` by the previous owner's `prev_active_link` on `cleanup_deps`. `None` also
    /// when nothing has ever tracked this dep.
    pub active_link: Option<LinkId>,
    pub sub_count: usize,
    /// Set for a dep that is the "dep half" of a [`crate::computed::Computed`]; lets `notify`
    /// re-propagate into the computed's own subscribers when the computed is itself read
    /// reactively. `None` for a plain signal's dep.
    pub owner_computed: Option<SubId>,
}

impl DepNode {
    pub(crate) fn new(owner_computed: Option<SubId>) -> Self {
        Self {
            version: 0,
            subs_tail: None,
            active_link: None,
            sub_count: 0,
            owner_computed,
        }
    }
}

/// Record that `dep` was read by whichever subscriber is currently active. No-op if tracking is
/// disabled or nothing is running (`SPEC_FULL.md` §4.2, `Dep::track`).
pub(crate) fn track(root: &Root, dep: DepId) {
    let active = root.active_sub.get();
    if !root.should_track.get() {
        return;
    }
    let Some(sub) = active else { return };
    // A computed must not track itself while refreshing (guards against a getter that reads its
    // own memoized dep through some indirection).
    if root.deps.borrow()[dep].owner_computed == Some(sub) {
        return;
    }

    let dep_version = root.deps.borrow()[dep].version;
    let current_link = root.deps.borrow()[dep].active_link;

    let link_matches = current_link
        .map(|l| link::sub_of(root, l) == sub)
        .unwrap_or(false);

    if !link_matches {
        let new_link = link::push_new_link(root, dep, sub, dep_version as i64);
        root.deps.borrow_mut()[dep].active_link = Some(new_link);
        add_sub(root, new_link);
    } else {
        let l = current_link.unwrap();
        if link::link_version(root, l) == -1 {
            link::set_link_version(root, l, dep_version as i64);
            link::move_dep_to_tail_if_needed(root, sub, l);
        }
    }
}

/// Wire a newly created (or reused-but-cold) link into the dep's subscriber list, cascading a
/// lazy resubscribe if `dep` belongs to a [`crate::computed::Computed`] that had no subscribers
/// until now (§4.2 "lazy subscription", §9 design notes).
fn add_sub(root: &Root, link: LinkId) {
    let dep = link::link_dep(root, link);

    if !subscriber::is_tracking(root, link::sub_of(root, link)) {
        return;
    }

    let owner_computed = root.deps.borrow()[dep].owner_computed;
    if let Some(computed) = owner_computed {
        let had_subs = root.deps.borrow()[dep].subs_tail.is_some();
        if !had_subs {
            subscriber::mark_tracking(root, computed);
            subscriber::mark_dirty_and_notified(root, computed);
            for upstream in subscriber::dep_link_chain(root, computed) {
                add_sub(root, upstream);
            }
        }
    }

    link::attach_to_subs_tail(root, link);
}

/// Bump `dep`'s version, bump the global version, and notify every subscriber (§4.2 `Dep::trigger`).
pub(crate) fn trigger(root: &Root, dep: DepId) {
    root.deps.borrow_mut()[dep].version += 1;
    root.global_version.set(root.global_version.get() + 1);
    notify(root, dep);
}

/// Walk `dep`'s subscriber list newest-to-oldest, notifying each; a notified [`crate::computed::Computed`]
/// that was itself being observed propagates the notification into its own dep (§4.2 `Dep::notify`).
pub(crate) fn notify(root: &Root, dep: DepId) {
    crate::batch::start_batch_on(root);
    let mut cursor = root.deps.borrow()[dep].subs_tail;
    while let Some(link) = cursor {
        let sub = link::sub_of(root, link);
        if subscriber::notify(root, sub) {
            if let Some(own_dep) = subscriber::dep_id_of(root, sub) {
                notify(root, own_dep);
            }
        }
        cursor = link::prev_sub(root, link);
    }
    crate::batch::end_batch_on(root);
}

/// Current stamped version of `dep`, used by dirty-checks that compare against a link's version.
pub(crate) fn version_of(root: &Root, dep: DepId) -> u64 {
    root.deps.borrow()[dep].version
}

/// Live subscriber count for `dep`, for crate-internal test assertions.
#[cfg(test)]
pub(crate) fn sub_count(root: &Root, dep: DepId) -> usize {
    root.deps.borrow()[dep].sub_count
}

/// A standalone reactive source, independent of the keyed registry (§4.2). A collaborator wraps
/// this in whatever value-holding type it wants — a `Signal<T>`, a property slot, a reactive
/// collection bucket — and calls [`Dep::track`] on every read and [`Dep::trigger`] on every write
/// of the value it guards.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Dep {
    id: DepId,
}

impl Dep {
    /// Allocate a new, empty reactive source with no current value opinion of its own.
    pub fn new() -> Dep {
        Root::with(|root| Dep {
            id: root.deps.borrow_mut().insert(DepNode::new(None)),
        })
    }

    /// This dep's internal arena handle, for crate-internal test assertions.
    #[cfg(test)]
    pub(crate) fn id(&self) -> DepId {
        self.id
    }

    /// Record a read of the value this dep guards against whichever subscriber is running.
    pub fn track(&self) {
        Root::with(|root| track(root, self.id));
    }

    /// Record a write: bump this dep's version and notify every subscriber.
    pub fn trigger(&self) {
        Root::with(|root| trigger(root, self.id));
    }
}

impl Default for Dep {
    fn default() -> Self {
        Dep::new()
    }
}
