//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that wants to hear about atom changes, such as an
//! async memo or a refresh coordinator.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::scene::Span;

/// Unique identifier for a subscriber.
///
/// Atoms key their subscriber sets by this id, which makes adding the same
/// subscriber twice a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something that can be invalidated when an atom it read changes.
///
/// Implementations must tolerate being notified more than once for the same
/// change.
pub trait AtomSubscriber: Send + Sync {
    /// Stable identity used for set membership.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called by an atom's owner after the underlying value changed.
    fn on_atom_changed(&self, span: &Span);
}

/// A subscriber backed by a callback.
///
/// Mostly used as a downstream observer for a single memo.
pub struct FnSubscriber {
    id: SubscriberId,
    notify: Box<dyn Fn(&Span) + Send + Sync>,
}

impl FnSubscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(&Span) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
        }
    }
}

impl AtomSubscriber for FnSubscriber {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn on_atom_changed(&self, span: &Span) {
        (self.notify)(span);
    }
}

impl std::fmt::Debug for FnSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSubscriber").field("id", &self.id).finish()
    }
}
