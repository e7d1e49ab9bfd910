//! [`Computed`]: a lazily recomputed, cached derived value (§4.4).
//!
//! A computed is both halves of the graph at once: it is a [`crate::subscriber`] of whatever its
//! getter reads, and a [`crate::dep`] for whoever reads *it*. Its value is only recomputed when
//! read while dirty (`get`/`value`), never eagerly — the lazy-subscription dance in
//! [`crate::dep::add_sub`] is what lets a computed with no readers drop its own upstream
//! subscriptions instead of needlessly recomputing on every upstream trigger.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dep::{self, DepNode};
use crate::error::ReactiveError;
use crate::graph::{Root, SubId};
use crate::subscriber;

/// A read-only or read-write cached derived value.
pub struct Computed<T> {
    pub(crate) id: SubId,
    storage: Rc<RefCell<Option<T>>>,
    setter: Option<Rc<dyn Fn(T)>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            storage: self.storage.clone(),
            setter: self.setter.clone(),
        }
    }
}

/// Create a read-only computed from a getter closure.
pub fn create_memo<T>(mut get: impl FnMut() -> T + 'static) -> Computed<T>
where
    T: PartialEq + Clone + 'static,
{
    create_computed_inner(move || get(), None)
}

/// Create a read-write computed: reads go through `get`, writes go through `set` (typically a
/// signal's setter). `set` does not itself mark this computed dirty — the upstream signal it
/// writes is what triggers recomputation on the next read.
pub fn create_writable_computed<T>(
    mut get: impl FnMut() -> T + 'static,
    set: impl Fn(T) + 'static,
) -> Computed<T>
where
    T: PartialEq + Clone + 'static,
{
    create_computed_inner(move || get(), Some(Rc::new(set)))
}

fn create_computed_inner<T>(
    mut get: impl FnMut() -> T + 'static,
    setter: Option<Rc<dyn Fn(T)>>,
) -> Computed<T>
where
    T: PartialEq + Clone + 'static,
{
    Root::with(|root| {
        let dep_id = root.deps.borrow_mut().insert(DepNode::new(None));
        let storage: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let storage_for_refresh = storage.clone();

        let refresh: Box<dyn FnMut(&Root) -> bool> = Box::new(move |_root| {
            let new_value = get();
            let mut slot = storage_for_refresh.borrow_mut();
            let changed = match slot.as_ref() {
                Some(old) => *old != new_value,
                None => true,
            };
            *slot = Some(new_value);
            changed
        });

        let id = subscriber::new_computed(root, dep_id, refresh);
        root.deps.borrow_mut()[dep_id].owner_computed = Some(id);

        Computed { id, storage, setter }
    })
}

/// Force `computed` to refresh synchronously if dirty, without reading its value or recording a
/// dependency edge. Visible for integrations that need a sync read right after a write (e.g. a
/// test assertion, or a scheduler that wants eager recomputation outside the normal lazy path).
pub fn refresh_computed<T: Clone + 'static>(computed: &Computed<T>) {
    Root::with(|root| {
        subscriber::refresh_if_needed(root, computed.id);
    });
}

impl<T: Clone + 'static> Computed<T> {
    /// Read the current value, recomputing first if dirty, and record this read against whoever
    /// is currently tracking (§4.4).
    pub fn get(&self) -> T {
        Root::with(|root| {
            subscriber::refresh_if_needed(root, self.id);
            let dep_id = subscriber::dep_id_of(root, self.id).expect("computed always has a dep");
            dep::track(root, dep_id);
        });
        self.storage
            .borrow()
            .clone()
            .expect("computed read before its first refresh")
    }

    /// Alias for [`Computed::get`], matching the teacher's `.value` style accessor naming less
    /// literally and the registry's "value" terminology more literally.
    pub fn value(&self) -> T {
        self.get()
    }

    /// Write through this computed's setter. Panics if it has none — use [`Computed::try_set`] to
    /// handle that case instead.
    pub fn set(&self, value: T) {
        self.try_set(value).expect("computed has no setter");
    }

    /// Write through this computed's setter, or report [`ReactiveError::ReadonlyComputed`] if it
    /// was created with [`create_memo`] rather than [`create_writable_computed`].
    pub fn try_set(&self, value: T) -> Result<(), ReactiveError> {
        match &self.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                #[cfg(all(feature = "trace", debug_assertions))]
                tracing::warn!("write attempted on a read-only computed");
                Err(ReactiveError::ReadonlyComputed)
            }
        }
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}
