//! Typed error kinds for fallible entry points.
//!
//! Most programmer errors in this crate (reading a disposed node, mismatched active-subscriber
//! bookkeeping) are reported as panics or debug-only [`tracing::warn!`] lines, matching how the
//! graph is meant to be driven: a single-threaded cooperative core where misuse is a bug, not a
//! recoverable condition. The variants here exist for the handful of entry points where a caller
//! may reasonably want to handle the failure instead of unwinding (the `try_*` methods on
//! [`crate::computed::Computed`]).

use thiserror::Error;

/// Error kinds recognized by the reactive core (see `SPEC_FULL.md` §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// A write was attempted on a [`crate::computed::Computed`] that has no setter.
    #[error("cannot write to a read-only computed")]
    ReadonlyComputed,
    /// A cyclic dependency was detected while refreshing a computed chain.
    #[error("cyclic reactive dependency detected")]
    CyclicDependency,
    /// `on_effect_cleanup` (or an equivalent lifecycle hook) was called with no active effect.
    #[error("no active effect to attach a cleanup callback to")]
    NoActiveEffect,
}
