//! [`Link`]: the edge type joining one [`DepId`] to one [`SubId`].
//!
//! A `Link` is simultaneously a node in two doubly-linked lists: the subscriber's dep list (head →
//! tail is access order within the current run) and the dep's subscriber list (walked tail → head
//! by `notify`, newest-registered first). Per `SPEC_FULL.md` §9, links are not reference-counted;
//! a link only exists in the dep's subscriber list while the subscriber is actively tracking, so a
//! paused or stopped subscriber keeps its dep-list entries (for quick resume) without inflating
//! the source's subscriber count.

use crate::graph::{DepId, LinkId, Root, SubId};

/// One dep ⇄ subscriber edge. See the module docs and `SPEC_FULL.md` §3.
pub(crate) struct Link {
    pub dep: DepId,
    pub sub: SubId,
    /// `dep.version` as of the last run that (re)used this link; `-1` while armed and unread.
    pub version: i64,

    pub prev_dep: Option<LinkId>,
    pub next_dep: Option<LinkId>,

    pub prev_sub: Option<LinkId>,
    pub next_sub: Option<LinkId>,

    /// `dep.active_link` as it was before this link became the active link, restored by
    /// `cleanup_deps` on exit.
    pub prev_active_link: Option<LinkId>,
    /// Whether this link is currently attached to the dep's subscriber list. A link can exist
    /// (recording that a subscriber once read this dep) without being subscribed, e.g. right
    /// after creation for a non-tracking subscriber.
    pub subscribed: bool,
}

impl Link {
    fn new(dep: DepId, sub: SubId, version: i64) -> Self {
        Self {
            dep,
            sub,
            version,
            prev_dep: None,
            next_dep: None,
            prev_sub: None,
            next_sub: None,
            prev_active_link: None,
            subscribed: false,
        }
    }
}

/// Create a link for `(dep, sub)` and append it to the tail of the subscriber's dep list. Does
/// not touch the dep's subscriber list — callers decide whether this edge should actually count
/// as a live subscription (`dep::add_sub`).
pub(crate) fn push_new_link(root: &Root, dep: DepId, sub: SubId, version: i64) -> LinkId {
    let link = Link::new(dep, sub, version);
    let id = root.links.borrow_mut().insert(link);
    let mut subs = root.subs.borrow_mut();
    let common = subs[sub].common_mut();
    let prev_tail = common.deps_tail;
    common.deps_tail = Some(id);
    if common.deps_head.is_none() {
        common.deps_head = Some(id);
    }
    drop(subs);
    links_mut(root, id).prev_dep = prev_tail;
    if let Some(prev) = prev_tail {
        links_mut(root, prev).next_dep = Some(id);
    }
    id
}

/// Append `link` to the tail of its dep's subscriber list (i.e. make this edge a live
/// subscription). Called from `dep::add_sub` once a link is confirmed to belong to a tracking
/// subscriber.
pub(crate) fn attach_to_subs_tail(root: &Root, link: LinkId) {
    let dep = link_dep(root, link);
    let prev_tail = root.deps.borrow()[dep].subs_tail;
    if prev_tail == Some(link) {
        return;
    }
    let was_subscribed = links_ref(root, link).subscribed;
    links_mut(root, link).prev_sub = prev_tail;
    links_mut(root, link).next_sub = None;
    links_mut(root, link).subscribed = true;
    if let Some(prev) = prev_tail {
        links_mut(root, prev).next_sub = Some(link);
    }
    root.deps.borrow_mut()[dep].subs_tail = Some(link);
    if !was_subscribed {
        root.deps.borrow_mut()[dep].sub_count += 1;
    }
    #[cfg(debug_assertions)]
    debug_assert_sub_count_matches(root, dep);
}

/// If `link` is not already the tail of `sub`'s dep list, splice it to the tail. Mirrors the
/// reuse branch of `Dep::track`: a dep accessed again this run moves to the end so the access
/// order this run becomes the new dep-list order.
pub(crate) fn move_dep_to_tail_if_needed(root: &Root, sub: SubId, link: LinkId) {
    let next = links_ref(root, link).next_dep;
    if next.is_none() {
        return; // already the tail
    }
    let prev = links_ref(root, link).prev_dep;

    let mut subs = root.subs.borrow_mut();
    let common = subs[sub].common_mut();
    if let Some(n) = next {
        links_mut(root, n).prev_dep = prev;
    }
    if let Some(p) = prev {
        links_mut(root, p).next_dep = next;
    }
    if common.deps_head == Some(link) {
        common.deps_head = next;
    }
    let old_tail = common.deps_tail;
    common.deps_tail = Some(link);
    drop(subs);

    if let Some(t) = old_tail {
        links_mut(root, t).next_dep = Some(link);
    }
    let mut l = links_mut(root, link);
    l.prev_dep = old_tail;
    l.next_dep = None;
}

/// Remove `link` from its subscriber's dep list only (used by `cleanup_deps` when a dep wasn't
/// reused this run, or when a subscriber stops outright).
pub(crate) fn remove_dep(root: &Root, link: LinkId) {
    let (prev, next, sub) = {
        let l = links_ref(root, link);
        (l.prev_dep, l.next_dep, l.sub)
    };
    let mut subs = root.subs.borrow_mut();
    let common = subs[sub].common_mut();
    if let Some(p) = prev {
        drop(subs);
        links_mut(root, p).next_dep = next;
        subs = root.subs.borrow_mut();
    } else {
        common.deps_head = next;
    }
    let common = subs[sub].common_mut();
    if let Some(n) = next {
        drop(subs);
        links_mut(root, n).prev_dep = prev;
    } else {
        common.deps_tail = prev;
    }
}

/// Remove `link` from its dep's subscriber list and decrement `sub_count`. Returns `true` once
/// the dep's subscriber count reaches zero (the caller may want to soft-unsubscribe a computed).
pub(crate) fn remove_sub(root: &Root, link: LinkId) -> bool {
    let (prev, next, dep, was_subscribed) = {
        let l = links_ref(root, link);
        (l.prev_sub, l.next_sub, l.dep, l.subscribed)
    };
    if !was_subscribed {
        return root.deps.borrow()[dep].sub_count == 0;
    }
    if let Some(p) = prev {
        links_mut(root, p).next_sub = next;
    }
    if let Some(n) = next {
        links_mut(root, n).prev_sub = prev;
    }
    links_mut(root, link).subscribed = false;
    let mut deps = root.deps.borrow_mut();
    let dep_node = &mut deps[dep];
    if dep_node.subs_tail == Some(link) {
        dep_node.subs_tail = prev;
    }
    if dep_node.active_link == Some(link) {
        dep_node.active_link = None;
    }
    dep_node.sub_count = dep_node.sub_count.saturating_sub(1);
    drop(deps);
    #[cfg(debug_assertions)]
    debug_assert_sub_count_matches(root, dep);
    root.deps.borrow()[dep].sub_count == 0
}

/// Walk `dep`'s subscriber list and check the live `Link` count against `sub_count`, enforcing
/// invariant 3 of `SPEC_FULL.md` §3/§8 (always compiled into debug builds, per §1B).
#[cfg(debug_assertions)]
fn debug_assert_sub_count_matches(root: &Root, dep: DepId) {
    let mut count = 0usize;
    let mut cursor = root.deps.borrow()[dep].subs_tail;
    while let Some(link) = cursor {
        count += 1;
        cursor = links_ref(root, link).prev_sub;
    }
    debug_assert_eq!(
        count,
        root.deps.borrow()[dep].sub_count,
        "dep.sub_count must equal the number of Links in its subscriber list"
    );
}

/// Free a link's slotmap slot. Callers must have already unlinked it from both lists.
pub(crate) fn free_link(root: &Root, link: LinkId) {
    root.links.borrow_mut().remove(link);
}

fn links_ref(root: &Root, link: LinkId) -> std::cell::Ref<'_, Link> {
    std::cell::Ref::map(root.links.borrow(), |links| &links[link])
}

fn links_mut(root: &Root, link: LinkId) -> std::cell::RefMut<'_, Link> {
    std::cell::RefMut::map(root.links.borrow_mut(), |links| &mut links[link])
}

pub(crate) fn link_dep(root: &Root, link: LinkId) -> DepId {
    links_ref(root, link).dep
}

pub(crate) fn sub_of(root: &Root, link: LinkId) -> SubId {
    links_ref(root, link).sub
}

pub(crate) fn link_version(root: &Root, link: LinkId) -> i64 {
    links_ref(root, link).version
}

pub(crate) fn set_link_version(root: &Root, link: LinkId, version: i64) {
    links_mut(root, link).version = version;
}

pub(crate) fn prev_sub(root: &Root, link: LinkId) -> Option<LinkId> {
    links_ref(root, link).prev_sub
}

pub(crate) fn next_dep(root: &Root, link: LinkId) -> Option<LinkId> {
    links_ref(root, link).next_dep
}

pub(crate) fn prev_dep(root: &Root, link: LinkId) -> Option<LinkId> {
    links_ref(root, link).prev_dep
}

pub(crate) fn take_prev_active_link(root: &Root, link: LinkId) -> Option<LinkId> {
    links_mut(root, link).prev_active_link.take()
}

pub(crate) fn set_prev_active_link(root: &Root, link: LinkId, prev: Option<LinkId>) {
    links_mut(root, link).prev_active_link = prev;
}
