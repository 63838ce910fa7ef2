//! Reactive Objects
//!
//! A reactive object wraps one record and lazily allocates an atom per key
//! the first time the key is touched. Reading a key through an attached view
//! reports that key's atom to the tracker; writing a key reports a change on
//! it.
//!
//! # Attaching
//!
//! [`ReactiveObject::attach_to`] binds the object to a change tracker and
//! returns an [`Attached`] view. Attaching is idempotent in the sense that
//! matters: every view of the same object shares the same atom table, so
//! re-attaching an already attached view never creates a second set of atoms
//! for the same keys.
//!
//! A detached object can still be read inside a
//! [`TrackingScope`](super::TrackingScope); outside one, reads fail with
//! [`ReactiveError::NoActiveTracker`].

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use super::atom::Atom;
use super::context::AmbientTracker;
use super::cursor::Cursor;
use super::tracker::{ChangeTracker, SharedTracker};
use super::value::Value;
use crate::error::{ReactiveError, Result};

static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A record whose keys are individually tracked.
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    id: u64,
    fields: RwLock<IndexMap<String, Value>>,
    atoms: DashMap<String, Atom>,
    untracked: RwLock<HashSet<String>>,
}

impl ReactiveObject {
    /// Create an object from key/value pairs.
    pub fn new<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::from_fields(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Create an object with no keys.
    pub fn empty() -> Self {
        Self::from_fields(IndexMap::new())
    }

    /// Create an object from a record value.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(fields) => Ok(Self::from_fields(fields)),
            other => Err(other.mismatch("record")),
        }
    }

    fn from_fields(fields: IndexMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                id: OBJECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                fields: RwLock::new(fields),
                atoms: DashMap::new(),
                untracked: RwLock::new(HashSet::new()),
            }),
        }
    }

    /// Exclude keys from tracking.
    ///
    /// Reads of these keys are not reported and writes do not notify.
    pub fn with_untracked_keys<K: Into<String>>(self, keys: impl IntoIterator<Item = K>) -> Self {
        self.inner
            .untracked
            .write()
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Get the object's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether reads and writes of `key` are tracked.
    pub fn is_tracked(&self, key: &str) -> bool {
        !self.inner.untracked.read().contains(key)
    }

    /// The atom backing `key`, allocated on first use.
    pub fn atom(&self, key: &str) -> Atom {
        if let Some(atom) = self.inner.atoms.get(key) {
            return atom.value().clone();
        }
        self.inner
            .atoms
            .entry(key.to_string())
            .or_insert_with(|| Atom::labeled(key))
            .value()
            .clone()
    }

    /// Bind the object to a change tracker.
    pub fn attach_to<T: ChangeTracker + 'static>(&self, tracker: T) -> Attached {
        self.attach_shared(Arc::new(tracker))
    }

    /// Bind the object to an already shared tracker.
    pub fn attach_shared(&self, tracker: SharedTracker) -> Attached {
        Attached {
            object: self.clone(),
            tracker,
        }
    }

    /// Read `key` through the ambient tracker.
    pub fn get(&self, key: &str) -> Result<Cursor> {
        self.attach_to(AmbientTracker).get(key)
    }

    /// Read the value of `key` through the ambient tracker.
    pub fn value(&self, key: &str) -> Result<Value> {
        self.get(key)?.value()
    }

    /// Write an untracked key without a tracker.
    ///
    /// Tracked keys can only be written through an attached view; attempting
    /// it here fails with [`ReactiveError::DetachedWrite`] and leaves the
    /// object unchanged.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.is_tracked(key) {
            return Err(ReactiveError::DetachedWrite);
        }
        self.inner.fields.write().insert(key.to_string(), value.into());
        Ok(())
    }

    /// Read a key without reporting anything.
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.inner.fields.read().get(key).cloned()
    }

    /// Copy of every field, without reporting anything.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.inner.fields.read().clone()
    }

    pub(super) fn fields(&self) -> &RwLock<IndexMap<String, Value>> {
        &self.inner.fields
    }
}

impl PartialEq for ReactiveObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self.inner.fields.read().keys().cloned().collect();
        f.debug_struct("ReactiveObject")
            .field("id", &self.inner.id)
            .field("keys", &keys)
            .field("atoms", &self.inner.atoms.len())
            .finish()
    }
}

impl Serialize for ReactiveObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

/// A reactive object bound to a change tracker.
#[derive(Clone)]
pub struct Attached {
    object: ReactiveObject,
    tracker: SharedTracker,
}

impl Attached {
    /// Re-bind to another tracker, sharing the same atoms.
    pub fn attach_to<T: ChangeTracker + 'static>(&self, tracker: T) -> Attached {
        self.object.attach_to(tracker)
    }

    /// The raw object behind this view.
    pub fn object(&self) -> &ReactiveObject {
        &self.object
    }

    /// The tracker this view reports to.
    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    /// The atom backing `key`.
    pub fn atom(&self, key: &str) -> Atom {
        self.object.atom(key)
    }

    /// Read `key`, returning a cursor that keeps tracking below it.
    pub fn get(&self, key: &str) -> Result<Cursor> {
        if !self.object.is_tracked(key) {
            return Ok(Cursor::untracked(self.object.clone(), key));
        }
        let atom = self.object.atom(key);
        self.tracker.on_atom_read(&atom)?;
        Ok(Cursor::new(
            self.object.clone(),
            key,
            atom,
            self.tracker.clone(),
        ))
    }

    /// Read the value stored under `key`.
    pub fn value(&self, key: &str) -> Result<Value> {
        self.get(key)?.value()
    }

    /// Whether `key` is present. Reported as a read of `key`.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.report_read(key)?;
        Ok(self.object.fields().read().contains_key(key))
    }

    /// Write `key`, then report the change.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.object
            .fields()
            .write()
            .insert(key.to_string(), value.into());
        self.report_changed(key)
    }

    /// Write several keys, reporting each.
    pub fn assign<K, V>(&self, fields: impl IntoIterator<Item = (K, V)>) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in fields {
            let key = key.into();
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Delete `key`, then report the change.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let removed = self.object.fields().write().shift_remove(key);
        self.report_changed(key)?;
        Ok(removed)
    }

    fn report_read(&self, key: &str) -> Result<()> {
        if self.object.is_tracked(key) {
            self.tracker.on_atom_read(&self.object.atom(key))?;
        }
        Ok(())
    }

    fn report_changed(&self, key: &str) -> Result<()> {
        if self.object.is_tracked(key) {
            self.tracker.on_atom_changed(&self.object.atom(key))
        } else {
            tracing::debug!(object = self.object.id(), key, "ignored untracked key set");
            Ok(())
        }
    }
}

impl fmt::Debug for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attached")
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}
