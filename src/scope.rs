//! [`EffectScope`]: bulk grouping and disposal for effects (§4.7).
//!
//! Grounded in the teacher's owner-tree pattern (parent/child `NodeId`s, `dispose_children`
//! walking the tree depth-first): a scope is a node that owns zero or more effects and zero or
//! more child scopes, and disposing it tears down everything underneath in one call. Unlike the
//! teacher's scopes, which also own arbitrary derived values, this crate's scopes exist purely to
//! batch-dispose effects — signals and computeds are owned by whoever holds their handle.

use crate::graph::{Root, ScopeId, SubId};
use crate::subscriber;

pub(crate) struct ScopeNode {
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub effects: Vec<SubId>,
    pub cleanups: Vec<Box<dyn FnOnce()>>,
    pub active: bool,
}

impl ScopeNode {
    fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            effects: Vec::new(),
            cleanups: Vec::new(),
            active: true,
        }
    }
}

/// Create a new scope, nested under whichever scope is currently active, if any.
pub(crate) fn create(root: &Root) -> ScopeId {
    let parent = root.scope_stack.borrow().last().copied();
    let id = root.scopes.borrow_mut().insert(ScopeNode::new(parent));
    if let Some(parent) = parent {
        root.scopes.borrow_mut()[parent].children.push(id);
    }
    id
}

/// Run `f` with `scope` pushed as the active scope, so any effect created inside is attached to
/// it.
pub(crate) fn run_in<R>(root: &Root, scope: ScopeId, f: impl FnOnce() -> R) -> R {
    root.scope_stack.borrow_mut().push(scope);
    let result = f();
    root.scope_stack.borrow_mut().pop();
    result
}

/// Attach an already-created effect to the currently active scope, if any.
pub(crate) fn attach_current_effect(root: &Root, sub: SubId) {
    if let Some(scope) = root.scope_stack.borrow().last().copied() {
        root.scopes.borrow_mut()[scope].effects.push(sub);
    }
}

pub(crate) fn on_dispose(root: &Root, scope: ScopeId, cleanup: Box<dyn FnOnce()>) {
    root.scopes.borrow_mut()[scope].cleanups.push(cleanup);
}

/// Dispose `scope`: stop every effect it owns, recursively dispose every child scope, run its own
/// cleanup callbacks, then unlink it from its parent.
pub(crate) fn dispose(root: &Root, scope: ScopeId) {
    let active = root.scopes.borrow()[scope].active;
    if !active {
        return;
    }
    let children = std::mem::take(&mut root.scopes.borrow_mut()[scope].children);
    for child in children {
        dispose(root, child);
    }
    let effects = std::mem::take(&mut root.scopes.borrow_mut()[scope].effects);
    for effect in effects {
        subscriber::dispose(root, effect);
    }
    let cleanups = std::mem::take(&mut root.scopes.borrow_mut()[scope].cleanups);
    for cleanup in cleanups {
        cleanup();
    }
    root.scopes.borrow_mut()[scope].active = false;

    let parent = root.scopes.borrow()[scope].parent;
    if let Some(parent) = parent {
        root.scopes.borrow_mut()[parent]
            .children
            .retain(|&c| c != scope);
    }
}

/// A handle for bulk-disposing a group of effects together (§4.7). Nesting a scope inside another
/// attaches it as a child, so disposing the parent disposes every descendant too.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EffectScope {
    id: ScopeId,
}

impl EffectScope {
    /// Create a new scope, nested under whichever scope is currently active (if `run` is called
    /// from inside one).
    pub fn new() -> EffectScope {
        EffectScope {
            id: Root::with(create),
        }
    }

    /// Run `f` with this scope active: any effect created inside (directly, not inside a nested
    /// scope of its own) is attached to this scope and disposed along with it.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        Root::with(|root| run_in(root, self.id, f))
    }

    /// Register a callback to run when this scope is disposed, independent of any one effect.
    pub fn on_dispose(&self, cleanup: impl FnOnce() + 'static) {
        Root::with(|root| on_dispose(root, self.id, Box::new(cleanup)));
    }

    /// Stop every effect owned by this scope (and its child scopes), then run their cleanups.
    pub fn dispose(self) {
        Root::with(|root| dispose(root, self.id));
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        EffectScope::new()
    }
}
