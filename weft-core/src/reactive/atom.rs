//! Atoms
//!
//! An atom is the smallest unit of trackable state. It carries no data of its
//! own, only an identity and the set of subscribers that read it.
//!
//! # Ownership
//!
//! Atoms own nothing. The atom → subscriber direction is a `Weak` lookup keyed
//! by [`SubscriberId`]; the owning direction is the subscriber's own
//! subscription set, which it walks to unsubscribe when disposed.
//!
//! # Notification
//!
//! [`Atom::notify_subscribers`] iterates a snapshot taken under the lock and
//! calls the subscribers after releasing it, so a subscriber may unsubscribe
//! (or subscribe something else) while being notified.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::subscriber::{AtomSubscriber, SubscriberId};
use crate::scene::Span;

/// Unique identifier for an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(u64);

impl AtomId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A trackable, subscribable unit of state.
///
/// Cloning an atom yields another handle to the same identity.
#[derive(Clone)]
pub struct Atom {
    inner: Arc<AtomInner>,
}

struct AtomInner {
    id: AtomId,
    label: Option<String>,
    subscribers: Mutex<IndexMap<SubscriberId, Weak<dyn AtomSubscriber>>>,
}

impl Atom {
    /// Create an anonymous atom.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an atom with a label used in logs and errors.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self::build(Some(label.into()))
    }

    fn build(label: Option<String>) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                id: AtomId::next(),
                label,
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// Get the atom's unique ID.
    pub fn id(&self) -> AtomId {
        self.inner.id
    }

    /// Get the atom's label, if any.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Subscribe to this atom. Subscribing twice is a no-op.
    ///
    /// Entries of dropped subscribers are pruned here as well as on notify.
    pub fn add_subscriber(&self, subscriber: &Arc<dyn AtomSubscriber>) {
        let id = subscriber.subscriber_id();
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|_, weak| weak.strong_count() > 0);
        if !subscribers.contains_key(&id) {
            subscribers.insert(id, Arc::downgrade(subscriber));
            tracing::trace!(atom = %self, subscriber = ?id, "subscribed");
        }
    }

    /// Remove a subscriber. Removing an absent subscriber is a no-op.
    pub fn delete_subscriber(&self, id: SubscriberId) {
        if self.inner.subscribers.lock().shift_remove(&id).is_some() {
            tracing::trace!(atom = %self, subscriber = ?id, "unsubscribed");
        }
    }

    /// Check whether the given subscriber is currently subscribed.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.lock().contains_key(&id)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Notify every subscriber that the value behind this atom changed.
    ///
    /// Subscribers that have been dropped are pruned along the way.
    pub fn notify_subscribers(&self, span: &Span) {
        let snapshot: Vec<Arc<dyn AtomSubscriber>> = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|_, weak| weak.strong_count() > 0);
            subscribers.values().filter_map(Weak::upgrade).collect()
        };

        tracing::debug!(atom = %self, subscribers = snapshot.len(), op = span.op(), "atom changed");

        for subscriber in snapshot {
            subscriber.on_atom_changed(span);
        }
    }
}

impl Default for Atom {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Atom {}

impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.label {
            Some(label) => write!(f, "atom#{}({})", self.inner.id.0, label),
            None => write!(f, "atom#{}", self.inner.id.0),
        }
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
