//! Tracking Scope
//!
//! The tracking scope binds a change tracker to a running computation so
//! that containers which are not explicitly attached to a tracker still know
//! where to report their reads.
//!
//! # Implementation
//!
//! The binding is a tokio task-local installed around one future (or one
//! synchronous closure). It travels with that future wherever it is polled
//! and disappears when the future completes, so two computations interleaved
//! on the same thread never see each other's tracker. Scopes nest: the
//! innermost binding wins and the outer one is restored afterwards.

use std::future::Future;
use std::sync::Arc;

use super::atom::Atom;
use super::tracker::{ChangeTracker, SharedTracker};
use crate::error::{ReactiveError, Result};

tokio::task_local! {
    static CURRENT_TRACKER: SharedTracker;
}

/// Entry points for binding and querying the ambient tracker.
pub struct TrackingScope;

impl TrackingScope {
    /// Run `future` with `tracker` as the ambient tracker.
    pub async fn run<F>(tracker: SharedTracker, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TRACKER.scope(tracker, future).await
    }

    /// Run `f` with `tracker` as the ambient tracker.
    pub fn sync<R>(tracker: SharedTracker, f: impl FnOnce() -> R) -> R {
        CURRENT_TRACKER.sync_scope(tracker, f)
    }

    /// Check if a tracker is bound.
    pub fn is_active() -> bool {
        CURRENT_TRACKER.try_with(|_| ()).is_ok()
    }

    /// The innermost bound tracker.
    pub fn current() -> Result<SharedTracker> {
        CURRENT_TRACKER
            .try_with(Arc::clone)
            .map_err(|_| ReactiveError::NoActiveTracker)
    }
}

/// Tracker used by containers that were never attached.
///
/// Reads go to the ambient tracker; writes are refused because there is no
/// scene to notify.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmbientTracker;

impl ChangeTracker for AmbientTracker {
    fn on_atom_read(&self, atom: &Atom) -> Result<()> {
        TrackingScope::current()?.on_atom_read(atom)
    }

    fn on_atom_changed(&self, _atom: &Atom) -> Result<()> {
        Err(ReactiveError::DetachedWrite)
    }
}
