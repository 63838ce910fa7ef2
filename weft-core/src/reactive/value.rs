//! Structured values held by reactive containers.
//!
//! [`Value`] is the closed set of shapes the interception layer knows how to
//! wrap. Each shape gets its own handling when read through a cursor:
//!
//! | shape                      | read through a cursor                       |
//! |----------------------------|---------------------------------------------|
//! | record, list, map, set     | wrapped, tracked through the parent key     |
//! | instant                    | copied out, untracked                       |
//! | reactive object            | returned raw, it tracks its own keys        |
//! | scalars                    | copied out                                  |

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use super::object::ReactiveObject;
use crate::error::ReactiveError;

/// A structured value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An opaque point in time. Never tracked below the key holding it.
    Instant(DateTime<Utc>),
    List(Vec<Value>),
    Record(IndexMap<String, Value>),
    Map(ValueMap),
    Set(ValueSet),
    /// An independently tracked object. Compared by identity.
    Reactive(ReactiveObject),
}

impl Value {
    /// Build a record from key/value pairs.
    pub fn record<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list.
    pub fn list<V: Into<Value>>(items: impl IntoIterator<Item = V>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build a map from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a set.
    pub fn set<V: Into<Value>>(members: impl IntoIterator<Item = V>) -> Self {
        Value::Set(members.into_iter().map(Into::into).collect())
    }

    /// Name of the value's shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Instant(_) => "instant",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Reactive(_) => "reactive object",
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> ReactiveError {
        ReactiveError::TypeMismatch {
            expected,
            found: self.shape(),
        }
    }

    /// Check if the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The instant, if this is one.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Instant(t) => Some(*t),
            _ => None,
        }
    }

    /// The list elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The record fields, if this is a record.
    pub fn as_record(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// The map, if this is one.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The set, if this is one.
    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// The nested reactive object, if this is one.
    pub fn as_reactive(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Reactive(object) => Some(object),
            _ => None,
        }
    }
}

/// Floats compare by bit pattern, so `NaN` equals itself and can be used as
/// a set member or map key.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Instant(a), Value::Instant(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Instant(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(fields: IndexMap<String, Value>) -> Self {
        Value::Record(fields)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(map)
    }
}

impl From<ValueSet> for Value {
    fn from(set: ValueSet) -> Self {
        Value::Set(set)
    }
}

impl From<ReactiveObject> for Value {
    fn from(object: ReactiveObject) -> Self {
        Value::Reactive(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// An insertion-ordered map keyed by arbitrary values.
///
/// Keys are compared with `==`, so records and lists can be keys.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ValueMap(Vec<(Value, Value)>);

impl ValueMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.0.iter().position(|(k, _)| k == key)
    }

    /// Check if `key` is present.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.position(key).map(|i| &self.0[i].1)
    }

    /// Mutable access to the value stored under `key`.
    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        match self.position(key) {
            Some(i) => Some(&mut self.0[i].1),
            None => None,
        }
    }

    /// Insert or replace, returning the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.0[i].1, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.0.remove(i).1)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(k, _)| k)
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, v)| v)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for ValueMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl FromIterator<(Value, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut map = ValueMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// An insertion-ordered set of values, compared with `==`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check if `value` is a member.
    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    /// Add a member, returning `false` if it was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    /// Remove a member, returning whether it was present.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.0.iter().position(|v| v == value) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// The member at insertion position `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_become_records() {
        let value = Value::from(json!({"a": {"b": [1, 2.5, "x", null, true]}}));
        let inner = value.as_record().unwrap()["a"].as_record().unwrap();
        assert_eq!(
            inner["b"],
            Value::list([
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Null,
                Value::Bool(true)
            ])
        );
    }

    #[test]
    fn map_insert_replaces_and_keeps_order() {
        let mut map = ValueMap::new();
        assert_eq!(map.insert("k1".into(), 1.into()), None);
        assert_eq!(map.insert("k2".into(), 2.into()), None);
        assert_eq!(map.insert("k1".into(), 3.into()), Some(Value::Int(1)));

        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec![Value::from("k1"), Value::from("k2")]);
        assert_eq!(map.remove(&"k2".into()), Some(Value::Int(2)));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn maps_and_sets_compare_without_order() {
        let a = Value::map([("x", 1), ("y", 2)]);
        let b = Value::map([("y", 2), ("x", 1)]);
        assert_eq!(a, b);

        assert_eq!(Value::set([1, 2, 3]), Value::set([3, 2, 1]));
        assert_ne!(Value::set([1, 2]), Value::set([1, 2, 3]));
    }

    #[test]
    fn sets_deduplicate_members() {
        let mut set = ValueSet::new();
        assert!(set.insert(Value::record([("b", "hello")])));
        assert!(!set.insert(Value::record([("b", "hello")])));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn type_mismatch_names_both_shapes() {
        let err = Value::Int(1).mismatch("list");
        assert_eq!(err.to_string(), "expected list, found int");
    }

    #[test]
    fn values_serialize_untagged() {
        let value = Value::record([("count", Value::Int(1)), ("tags", Value::set(["a"]))]);
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"count": 1, "tags": ["a"]})
        );
    }

    #[test]
    fn nan_equals_itself() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_ne!(Value::Float(1.0), Value::Int(1));

        let mut set = ValueSet::new();
        assert!(set.insert(nan.clone()));
        assert!(!set.insert(nan.clone()));
        assert!(set.remove(&nan));
        assert!(set.is_empty());
    }
}
