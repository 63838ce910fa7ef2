//! Ref Implementation
//!
//! A `Ref` is the simplest reactive container: a single value backed by a
//! single atom.
//!
//! # How Refs Work
//!
//! 1. `get` reports the ref's atom to the given tracker, then returns a clone
//!    of the value.
//!
//! 2. `set` replaces the value, then reports a change to the given tracker.
//!    A read-write scene turns that into a notification of every subscriber.
//!
//! The tracker is always passed explicitly; a ref never guesses which
//! computation is reading it.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::atom::Atom;
use super::tracker::ChangeTracker;
use crate::error::Result;

/// A single reactive value.
pub struct Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The atom reads and writes are reported on.
    atom: Atom,

    /// The current value.
    value: Arc<RwLock<T>>,
}

impl<T> Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new ref with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            atom: Atom::new(),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// Create a new ref whose atom carries a label.
    pub fn labeled(label: impl Into<String>, value: T) -> Self {
        Self {
            atom: Atom::labeled(label),
            value: Arc::new(RwLock::new(value)),
        }
    }

    /// The atom backing this ref.
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// Get the current value, reporting the read to `tracker`.
    pub fn get(&self, tracker: &dyn ChangeTracker) -> Result<T> {
        tracker.on_atom_read(&self.atom)?;
        Ok(self.value.read().clone())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Set a new value and report the change to `tracker`.
    pub fn set(&self, value: T, tracker: &dyn ChangeTracker) -> Result<()> {
        *self.value.write() = value;
        tracker.on_atom_changed(&self.atom)
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F, tracker: &dyn ChangeTracker) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = {
            let guard = self.value.read();
            f(&guard)
        };
        self.set(new_value, tracker)
    }
}

impl<T> Clone for Ref<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> Debug for Ref<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("atom", &self.atom)
            .field("value", &self.get_untracked())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReactiveError;
    use crate::reactive::{AtomSubscriber, FnSubscriber, ReadSet};
    use crate::scene::{Scene, Span};
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn ref_get_reports_read() {
        let reads = ReadSet::new();
        let cell = Ref::new(10);

        assert_eq!(cell.get(&reads).unwrap(), 10);
        assert!(reads.contains(cell.atom()));
    }

    #[test]
    fn ref_set_notifies_through_scene() {
        let cell = Ref::labeled("executing", false);
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();
        let subscriber: Arc<dyn AtomSubscriber> = Arc::new(FnSubscriber::new(move |_| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));
        cell.atom().add_subscriber(&subscriber);

        let scene = Scene::read_write(Span::new("click"));
        cell.set(true, &scene).unwrap();
        cell.update(|v| !v, &scene).unwrap();

        assert!(!cell.get_untracked());
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn ref_set_in_read_only_scene_fails() {
        let cell = Ref::new(1);
        let scene = Scene::read_only(Span::new("render"));
        assert!(matches!(
            cell.set(2, &scene),
            Err(ReactiveError::ReadonlyViolation { .. })
        ));
    }

    #[test]
    fn ref_clone_shares_state() {
        let a = Ref::new(0);
        let b = a.clone();
        let scene = Scene::read_write(Span::new("edit"));

        a.set(42, &scene).unwrap();
        assert_eq!(b.get_untracked(), 42);
        assert_eq!(a.atom(), b.atom());
    }
}
