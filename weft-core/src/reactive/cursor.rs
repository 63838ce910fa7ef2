//! Cursors
//!
//! A cursor is what a read through an attached object hands back: a position
//! inside the value stored under one key, still bound to that key's atom and
//! to the tracker the read went through.
//!
//! Everything reachable below a key is tracked through that single key atom.
//! Reading `a.b.c` reports a read of `a`; writing `a.b.c` reports a change on
//! `a`. Nested fields never get atoms of their own.
//!
//! Shapes are handled as follows:
//!
//! - records and lists: reads report, writes mutate then report;
//! - maps and sets: mutators report the change first, then mutate, so a
//!   refused change leaves the collection untouched; iteration yields
//!   cursors, so values pulled out of a collection stay tracked;
//! - instants: copied out, so mutating the copy notifies nobody;
//! - reactive objects: returned raw, they track their own keys.

use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use smallvec::SmallVec;

use super::atom::Atom;
use super::object::ReactiveObject;
use super::tracker::SharedTracker;
use super::value::Value;
use crate::error::{ReactiveError, Result};

/// One step from a value into one of its parts.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
    Entry(Value),
    Member(usize),
}

/// Whether a mutation is reported before or after it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    Before,
    After,
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Record(fields), Segment::Field(name)) => fields.get(name),
        (Value::List(items), Segment::Index(i)) => items.get(*i),
        (Value::Map(map), Segment::Entry(key)) => map.get(key),
        (Value::Set(set), Segment::Member(i)) => set.get(*i),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &Segment) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Record(fields), Segment::Field(name)) => fields.get_mut(name),
        (Value::List(items), Segment::Index(i)) => items.get_mut(*i),
        (Value::Map(map), Segment::Entry(key)) => map.get_mut(key),
        _ => None,
    }
}

/// A tracked position inside the value stored under one key.
#[derive(Clone)]
pub struct Cursor {
    object: ReactiveObject,
    key: String,
    atom: Atom,
    path: SmallVec<[Segment; 4]>,
    tracker: Option<SharedTracker>,
}

impl Cursor {
    pub(super) fn new(
        object: ReactiveObject,
        key: &str,
        atom: Atom,
        tracker: SharedTracker,
    ) -> Self {
        Self {
            object,
            key: key.to_string(),
            atom,
            path: SmallVec::new(),
            tracker: Some(tracker),
        }
    }

    pub(super) fn untracked(object: ReactiveObject, key: &str) -> Self {
        let atom = object.atom(key);
        Self {
            object,
            key: key.to_string(),
            atom,
            path: SmallVec::new(),
            tracker: None,
        }
    }

    /// The atom every read and write through this cursor is reported on.
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// Human readable path, e.g. `a.b[0]`.
    pub fn path(&self) -> String {
        let mut out = self.key.clone();
        for segment in &self.path {
            // Writing into a String never fails.
            let _ = match segment {
                Segment::Field(name) => write!(out, ".{name}"),
                Segment::Index(i) => write!(out, "[{i}]"),
                Segment::Entry(key) => write!(out, "[{key:?}]"),
                Segment::Member(i) => write!(out, "{{{i}}}"),
            };
        }
        out
    }

    fn child(&self, segment: Segment) -> Cursor {
        let mut child = self.clone();
        child.path.push(segment);
        child
    }

    fn report_read(&self) -> Result<()> {
        match &self.tracker {
            Some(tracker) => tracker.on_atom_read(&self.atom),
            None => Ok(()),
        }
    }

    fn report_changed(&self) -> Result<()> {
        match &self.tracker {
            Some(tracker) => tracker.on_atom_changed(&self.atom),
            None => {
                tracing::debug!(path = %self.path(), "ignored untracked key set");
                Ok(())
            }
        }
    }

    /// Resolve the path without reporting anything.
    fn resolve<'a>(&self, fields: &'a IndexMap<String, Value>) -> Option<&'a Value> {
        let mut current = fields.get(&self.key);
        for segment in &self.path {
            current = current.and_then(|value| step(value, segment));
        }
        current
    }

    /// Run `f` on the current value, `None` when the path does not resolve.
    fn inspect<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> Result<R> {
        self.report_read()?;
        let fields = self.object.fields().read();
        Ok(f(self.resolve(&fields)))
    }

    /// Fail unless a write of shape `expected` can be applied here.
    ///
    /// `None` accepts any shape and lets a missing top-level key be created.
    fn check_writable(&self, expected: Option<&'static str>) -> Result<()> {
        if self.path.iter().any(|s| matches!(s, Segment::Member(_))) {
            return Err(ReactiveError::SetMemberWrite { path: self.path() });
        }
        let fields = self.object.fields().read();
        match (self.resolve(&fields), expected) {
            (Some(value), Some(expected)) if value.shape() != expected => Err(value.mismatch(expected)),
            (Some(_), _) => Ok(()),
            (None, None) if self.path.is_empty() => Ok(()),
            (None, Some(expected)) if self.path.is_empty() => Err(Value::Null.mismatch(expected)),
            (None, _) => Err(self.missing()),
        }
    }

    /// Apply `f` to the value at this position and report the change.
    ///
    /// The target is validated first, so a failing write neither reports a
    /// change nor leaves anything behind.
    fn mutate<R>(
        &self,
        report: Report,
        expected: Option<&'static str>,
        f: impl FnOnce(&mut Value) -> Result<R>,
    ) -> Result<R> {
        self.check_writable(expected)?;
        if report == Report::Before {
            self.report_changed()?;
        }
        let result = {
            let mut fields = self.object.fields().write();
            let root = if self.path.is_empty() && expected.is_none() {
                fields.entry(self.key.clone()).or_insert(Value::Null)
            } else {
                fields
                    .get_mut(&self.key)
                    .ok_or_else(|| self.missing())?
            };
            let mut current = root;
            for segment in &self.path {
                current = step_mut(current, segment).ok_or_else(|| self.missing())?;
            }
            f(current)?
        };
        if report == Report::After {
            self.report_changed()?;
        }
        Ok(result)
    }

    fn missing(&self) -> ReactiveError {
        ReactiveError::MissingPath { path: self.path() }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Copy of the current value; `Null` when the path does not resolve.
    ///
    /// A reactive object is returned as its raw handle.
    pub fn value(&self) -> Result<Value> {
        self.inspect(|value| value.cloned().unwrap_or_default())
    }

    /// Shape of the current value.
    pub fn shape(&self) -> Result<&'static str> {
        self.inspect(|value| value.map_or("null", Value::shape))
    }

    /// The boolean stored here.
    pub fn as_bool(&self) -> Result<bool> {
        self.typed("bool", Value::as_bool)
    }

    /// The integer stored here.
    pub fn as_i64(&self) -> Result<i64> {
        self.typed("int", Value::as_i64)
    }

    /// The number stored here, widening integers.
    pub fn as_f64(&self) -> Result<f64> {
        self.typed("float", Value::as_f64)
    }

    /// The string stored here, copied out.
    pub fn as_string(&self) -> Result<String> {
        self.typed("string", |v| v.as_str().map(str::to_string))
    }

    /// The instant stored here, copied out.
    pub fn as_instant(&self) -> Result<DateTime<Utc>> {
        self.typed("instant", Value::as_instant)
    }

    /// The raw reactive object stored here, if any.
    pub fn reactive(&self) -> Result<Option<ReactiveObject>> {
        self.inspect(|value| value.and_then(Value::as_reactive).cloned())
    }

    fn typed<T>(&self, expected: &'static str, f: impl FnOnce(&Value) -> Option<T>) -> Result<T> {
        self.inspect(|value| {
            let value = value.unwrap_or(&Value::Null);
            f(value).ok_or_else(|| value.mismatch(expected))
        })?
    }

    fn expect_shape(&self, expected: &'static str, ok: fn(&Value) -> bool) -> Result<()> {
        self.inspect(|value| match value {
            Some(value) if !ok(value) => Err(value.mismatch(expected)),
            _ => Ok(()),
        })?
    }

    /// Descend into a record field.
    pub fn field(&self, name: &str) -> Result<Cursor> {
        self.expect_shape("record", |v| matches!(v, Value::Record(_)))?;
        Ok(self.child(Segment::Field(name.to_string())))
    }

    /// Descend into a list element.
    pub fn index(&self, index: usize) -> Result<Cursor> {
        self.expect_shape("list", |v| matches!(v, Value::List(_)))?;
        Ok(self.child(Segment::Index(index)))
    }

    /// Number of elements of a list, map, set or record.
    pub fn len(&self) -> Result<usize> {
        self.inspect(|value| match value {
            Some(Value::List(items)) => Ok(items.len()),
            Some(Value::Map(map)) => Ok(map.len()),
            Some(Value::Set(set)) => Ok(set.len()),
            Some(Value::Record(fields)) => Ok(fields.len()),
            Some(other) => Err(other.mismatch("collection")),
            None => Ok(0),
        })?
    }

    /// Check if the collection has no elements.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Cursors over the elements of a list.
    pub fn items(&self) -> Result<Vec<Cursor>> {
        let len = self.inspect(|value| match value {
            Some(Value::List(items)) => Ok(items.len()),
            Some(other) => Err(other.mismatch("list")),
            None => Ok(0),
        })??;
        Ok((0..len).map(|i| self.child(Segment::Index(i))).collect())
    }

    /// Cursor over the value stored under `key` in a map.
    pub fn entry(&self, key: impl Into<Value>) -> Result<Option<Cursor>> {
        let key = key.into();
        let present = self.inspect(|value| match value {
            Some(Value::Map(map)) => Ok(map.contains_key(&key)),
            Some(other) => Err(other.mismatch("map")),
            None => Ok(false),
        })??;
        Ok(present.then(|| self.child(Segment::Entry(key))))
    }

    /// Check if a map has `key`.
    pub fn contains_key(&self, key: impl Into<Value>) -> Result<bool> {
        Ok(self.entry(key)?.is_some())
    }

    /// Keys of a map, copied out.
    pub fn keys(&self) -> Result<Vec<Value>> {
        self.inspect(|value| match value {
            Some(Value::Map(map)) => Ok(map.keys().cloned().collect()),
            Some(other) => Err(other.mismatch("map")),
            None => Ok(Vec::new()),
        })?
    }

    /// Cursors over the values of a map.
    pub fn values(&self) -> Result<Vec<Cursor>> {
        Ok(self.entries()?.into_iter().map(|(_, v)| v).collect())
    }

    /// Keys and value cursors of a map.
    pub fn entries(&self) -> Result<Vec<(Value, Cursor)>> {
        Ok(self
            .keys()?
            .into_iter()
            .map(|key| {
                let cursor = self.child(Segment::Entry(key.clone()));
                (key, cursor)
            })
            .collect())
    }

    /// Whether a set contains `member`.
    pub fn contains(&self, member: impl Into<Value>) -> Result<bool> {
        let member = member.into();
        self.inspect(|value| match value {
            Some(Value::Set(set)) => Ok(set.contains(&member)),
            Some(other) => Err(other.mismatch("set")),
            None => Ok(false),
        })?
    }

    /// Read-only cursors over the members of a set.
    pub fn members(&self) -> Result<Vec<Cursor>> {
        let len = self.inspect(|value| match value {
            Some(Value::Set(set)) => Ok(set.len()),
            Some(other) => Err(other.mismatch("set")),
            None => Ok(0),
        })??;
        Ok((0..len).map(|i| self.child(Segment::Member(i))).collect())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Replace the value at this position.
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate(Report::After, None, |current| {
            *current = value;
            Ok(())
        })
    }

    /// Set a field of a record.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate(Report::After, Some("record"), |current| match current {
            Value::Record(fields) => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
            other => Err(other.mismatch("record")),
        })
    }

    /// Mutate the value in place with arbitrary code.
    pub fn update<R>(&self, f: impl FnOnce(&mut Value) -> R) -> Result<R> {
        self.mutate(Report::After, None, |current| Ok(f(current)))
    }

    /// Append to a list.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate(Report::After, Some("list"), |current| match current {
            Value::List(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(other.mismatch("list")),
        })
    }

    /// Shorten a list to `len` elements.
    pub fn truncate(&self, len: usize) -> Result<()> {
        self.mutate(Report::After, Some("list"), |current| match current {
            Value::List(items) => {
                items.truncate(len);
                Ok(())
            }
            other => Err(other.mismatch("list")),
        })
    }

    /// Insert into a map, returning the previous value.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        let (key, value) = (key.into(), value.into());
        self.mutate(Report::Before, Some("map"), |current| match current {
            Value::Map(map) => Ok(map.insert(key, value)),
            other => Err(other.mismatch("map")),
        })
    }

    /// Remove a map key, returning its value.
    pub fn remove(&self, key: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        self.mutate(Report::Before, Some("map"), |current| match current {
            Value::Map(map) => Ok(map.remove(&key)),
            other => Err(other.mismatch("map")),
        })
    }

    /// Add a member to a set, returning `false` if it was already present.
    pub fn add(&self, member: impl Into<Value>) -> Result<bool> {
        let member = member.into();
        self.mutate(Report::Before, Some("set"), |current| match current {
            Value::Set(set) => Ok(set.insert(member)),
            other => Err(other.mismatch("set")),
        })
    }

    /// Remove a member from a set, returning whether it was present.
    pub fn delete(&self, member: impl Into<Value>) -> Result<bool> {
        let member = member.into();
        self.mutate(Report::Before, Some("set"), |current| match current {
            Value::Set(set) => Ok(set.remove(&member)),
            other => Err(other.mismatch("set")),
        })
    }

    /// Empty a map, set or list.
    ///
    /// Only the change is reported, not a read of the collection.
    pub fn clear(&self) -> Result<()> {
        let shape = {
            let fields = self.object.fields().read();
            self.resolve(&fields).map_or("null", Value::shape)
        };
        let report = match shape {
            "list" => Report::After,
            "map" | "set" => Report::Before,
            other => {
                return Err(ReactiveError::TypeMismatch {
                    expected: "collection",
                    found: other,
                })
            }
        };
        self.mutate(report, Some(shape), |current| match current {
            Value::Map(map) => Ok(map.clear()),
            Value::Set(set) => Ok(set.clear()),
            Value::List(items) => Ok(items.clear()),
            other => Err(other.mismatch("collection")),
        })
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &self.path())
            .field("atom", &self.atom)
            .field("tracked", &self.tracker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ChangeTracker, ReadSet};
    use crate::scene::{Scene, Span};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct Counts {
        reads: Mutex<usize>,
        changes: Mutex<Vec<String>>,
    }

    impl ChangeTracker for Counts {
        fn on_atom_read(&self, _atom: &Atom) -> Result<()> {
            *self.reads.lock() += 1;
            Ok(())
        }

        fn on_atom_changed(&self, atom: &Atom) -> Result<()> {
            self.changes
                .lock()
                .push(atom.label().unwrap_or("?").to_string());
            Ok(())
        }
    }

    fn attached(value: serde_json::Value) -> (ReactiveObject, Arc<Counts>) {
        let object = ReactiveObject::from_value(value.into()).unwrap();
        (object, Arc::new(Counts::default()))
    }

    #[test]
    fn nested_reads_report_the_parent_atom() {
        let (object, _) = attached(serde_json::json!({"a": {"b": "hello"}}));
        let reads = Arc::new(ReadSet::new());
        let view = object.attach_to(reads.clone());

        let b = view.get("a").unwrap().field("b").unwrap();
        assert_eq!(b.as_string().unwrap(), "hello");
        assert_eq!(b.path(), "a.b");
        assert_eq!(b.atom(), &object.atom("a"));
        assert_eq!(reads.atoms(), vec![object.atom("a")]);
    }

    #[test]
    fn nested_writes_report_the_parent_atom() {
        let (object, counts) = attached(serde_json::json!({"a": {"b": "hello"}}));
        let view = object.attach_to(counts.clone());

        view.get("a").unwrap().field("b").unwrap().set("world").unwrap();
        view.get("a").unwrap().set_field("c", 1).unwrap();

        assert_eq!(counts.changes.lock().as_slice(), ["a", "a"]);
        assert_eq!(
            view.get("a").unwrap().value().unwrap(),
            Value::record([("b", Value::from("world")), ("c", Value::Int(1))])
        );
    }

    #[test]
    fn list_operations() {
        let (object, counts) = attached(serde_json::json!({"a": ["first", "second"]}));
        let a = object.attach_to(counts.clone()).get("a").unwrap();

        assert_eq!(a.len().unwrap(), 2);
        a.push("third").unwrap();
        assert_eq!(a.index(2).unwrap().as_string().unwrap(), "third");

        a.truncate(0).unwrap();
        assert_eq!(a.index(0).unwrap().value().unwrap(), Value::Null);
        assert_eq!(counts.changes.lock().len(), 2);
    }

    #[test]
    fn list_iteration_yields_tracked_cursors() {
        let (object, counts) = attached(serde_json::json!({"a": [1, 2, 3]}));
        let a = object.attach_to(counts.clone()).get("a").unwrap();

        let total: i64 = a
            .items()
            .unwrap()
            .iter()
            .map(|item| item.as_i64().unwrap())
            .sum();
        assert_eq!(total, 6);
        assert!(*counts.reads.lock() >= 4);
    }

    #[test]
    fn map_mutators_and_iteration() {
        let object = ReactiveObject::new([("a", Value::map(Vec::<(Value, Value)>::new()))]);
        let counts = Arc::new(Counts::default());
        let a = object.attach_to(counts.clone()).get("a").unwrap();

        assert_eq!(a.insert("k1", "v1").unwrap(), None);
        assert_eq!(a.insert("k2", Value::list(["hello"])).unwrap(), None);
        assert_eq!(a.keys().unwrap(), vec![Value::from("k1"), Value::from("k2")]);

        let k2 = a.entry("k2").unwrap().unwrap();
        k2.push("world").unwrap();
        assert_eq!(
            k2.value().unwrap(),
            Value::list(["hello", "world"])
        );

        let joined: Vec<String> = a
            .values()
            .unwrap()
            .into_iter()
            .filter_map(|v| v.as_string().ok())
            .collect();
        assert_eq!(joined, vec!["v1".to_string()]);

        assert_eq!(a.remove("k1").unwrap(), Some(Value::from("v1")));
        a.clear().unwrap();
        assert!(a.is_empty().unwrap());
        assert!(a.entry("k2").unwrap().is_none());
        assert_eq!(counts.changes.lock().len(), 5);
    }

    #[test]
    fn set_members_stay_tracked() {
        let object = ReactiveObject::new([(
            "a",
            Value::set([Value::record([("b", "hello")])]),
        )]);
        let reads = Arc::new(ReadSet::new());
        let a = object.attach_to(reads.clone()).get("a").unwrap();

        let member = a.members().unwrap().remove(0);
        assert_eq!(member.field("b").unwrap().as_string().unwrap(), "hello");
        assert_eq!(reads.atoms(), vec![object.atom("a")]);
    }

    #[test]
    fn set_operations() {
        let object = ReactiveObject::new([("a", Value::set(["red"]))]);
        let counts = Arc::new(Counts::default());
        let a = object.attach_to(counts.clone()).get("a").unwrap();

        assert!(a.add("x").unwrap());
        assert!(!a.add("x").unwrap());
        assert!(a.contains("x").unwrap());
        assert!(a.delete("x").unwrap());
        assert_eq!(counts.changes.lock().as_slice(), ["a", "a", "a"]);
    }

    #[test]
    fn set_members_can_not_be_written() {
        let object = ReactiveObject::new([("a", Value::set([1, 2]))]);
        let counts = Arc::new(Counts::default());
        let a = object.attach_to(counts.clone()).get("a").unwrap();
        let first = a.members().unwrap().remove(0);

        assert!(matches!(
            first.set(2),
            Err(ReactiveError::SetMemberWrite { .. })
        ));
        assert!(matches!(
            first.update(|v| *v = Value::Int(2)),
            Err(ReactiveError::SetMemberWrite { .. })
        ));
        assert_eq!(a.len().unwrap(), 2);
        assert_eq!(object.peek("a"), Some(Value::set([1, 2])));
        assert!(counts.changes.lock().is_empty());
    }

    #[test]
    fn failed_writes_leave_no_trace() {
        let (object, counts) = attached(serde_json::json!({"a": 1}));
        let view = object.attach_to(counts.clone());
        let missing = view.get("missing").unwrap();

        assert!(matches!(
            missing.push(1),
            Err(ReactiveError::TypeMismatch { expected: "list", found: "null" })
        ));
        assert!(matches!(
            missing.insert("k", 1),
            Err(ReactiveError::TypeMismatch { expected: "map", found: "null" })
        ));
        assert!(matches!(
            view.get("a").unwrap().add("x"),
            Err(ReactiveError::TypeMismatch { expected: "set", found: "int" })
        ));
        assert!(missing.clear().is_err());

        assert!(object.peek("missing").is_none());
        assert_eq!(object.snapshot().len(), 1);
        assert!(counts.changes.lock().is_empty());
    }

    #[test]
    fn set_creates_a_missing_key() {
        let (object, counts) = attached(serde_json::json!({}));
        object.attach_to(counts.clone()).get("fresh").unwrap().set(3).unwrap();

        assert_eq!(object.peek("fresh"), Some(Value::Int(3)));
        assert_eq!(counts.changes.lock().len(), 1);
    }

    #[test]
    fn clear_reports_only_the_change() {
        let (object, counts) = attached(serde_json::json!({"a": [1, 2]}));
        let a = object.attach_to(counts.clone()).get("a").unwrap();
        let reads_before = *counts.reads.lock();

        a.clear().unwrap();

        assert_eq!(*counts.reads.lock(), reads_before);
        assert_eq!(counts.changes.lock().len(), 1);
        assert_eq!(object.peek("a"), Some(Value::list(Vec::<Value>::new())));
    }

    #[test]
    fn refused_map_change_leaves_map_untouched() {
        let object = ReactiveObject::new([("a", Value::map([("k", 1)]))]);
        let scene = Scene::read_only(Span::new("render"));
        let a = object.attach_to(scene).get("a").unwrap();

        assert!(matches!(
            a.insert("k2", 2),
            Err(ReactiveError::ReadonlyViolation { .. })
        ));
        assert_eq!(object.peek("a"), Some(Value::map([("k", 1)])));
    }

    #[test]
    fn instants_are_copied_out() {
        let start = DateTime::<Utc>::from_timestamp(1, 0).unwrap();
        let object = ReactiveObject::new([("at", start)]);
        let counts = Arc::new(Counts::default());
        let at = object.attach_to(counts.clone()).get("at").unwrap();

        let mut copy = at.as_instant().unwrap();
        copy += chrono::Duration::seconds(1);

        assert_eq!(at.as_instant().unwrap(), start);
        assert_ne!(copy, start);
        assert!(counts.changes.lock().is_empty());
    }

    #[test]
    fn reactive_values_are_returned_raw() {
        let inner = ReactiveObject::new([("b", "hello")]);
        let outer = ReactiveObject::new([("a", Value::list([Value::from(inner.clone())]))]);
        let reads = Arc::new(ReadSet::new());

        let found = outer
            .attach_to(reads.clone())
            .get("a")
            .unwrap()
            .index(0)
            .unwrap()
            .reactive()
            .unwrap()
            .unwrap();

        assert!(found.ptr_eq(&inner));
        assert_eq!(found.peek("b"), Some(Value::from("hello")));
        assert!(!reads.contains(&inner.atom("b")));
    }

    #[test]
    fn wrong_shape_is_a_type_mismatch() {
        let (object, counts) = attached(serde_json::json!({"n": 1}));
        let n = object.attach_to(counts).get("n").unwrap();

        assert!(matches!(
            n.push(2),
            Err(ReactiveError::TypeMismatch { expected: "list", found: "int" })
        ));
        assert!(matches!(
            n.field("x"),
            Err(ReactiveError::TypeMismatch { expected: "record", .. })
        ));
    }

    #[test]
    fn writes_below_a_vanished_path_fail() {
        let (object, counts) = attached(serde_json::json!({"a": {"b": {"c": 1}}}));
        let view = object.attach_to(counts);
        let c = view.get("a").unwrap().field("b").unwrap().field("c").unwrap();

        view.set("a", 5).unwrap();
        assert!(matches!(
            c.set(2),
            Err(ReactiveError::MissingPath { path }) if path == "a.b.c"
        ));
        assert_eq!(c.value().unwrap(), Value::Null);
    }

    #[test]
    fn update_runs_custom_mutation() {
        let (object, counts) = attached(serde_json::json!({"a": {"b": {"c": "hello"}}}));
        let a = object.attach_to(counts.clone()).get("a").unwrap();

        a.update(|value| {
            if let Value::Record(fields) = value {
                fields.insert("b".to_string(), Value::record([("c", "world")]));
            }
        })
        .unwrap();

        assert_eq!(
            a.field("b").unwrap().field("c").unwrap().as_string().unwrap(),
            "world"
        );
        assert_eq!(counts.changes.lock().as_slice(), ["a"]);
    }
}
