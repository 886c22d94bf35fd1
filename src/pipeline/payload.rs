//! Payload model: the mapping of named values threaded through a run.
//!
//! A [`Payload`] is an ordered map from string keys to [`Value`]s. The schema is
//! open; stages read and write keys by convention (the built-in arithmetic
//! stages use [`PASSTHROUGH`]). Payloads are passed by reference into stages
//! and nodes, which return new payloads rather than mutating their input.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Reserved key carrying the primary scalar value through arithmetic stages.
pub const PASSTHROUGH: &str = "passthrough";

/// Reserved key under which traced pipes record their stage outputs.
pub const TRACE: &str = "trace";

/// A single payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Payload),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Payload> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Payload> for Value {
    fn from(v: Payload) -> Self {
        Value::Map(v)
    }
}

/// Mapping of named values passed between stages and nodes.
///
/// Keys iterate in sorted order, so rendering and serialization are stable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Insert a value, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Overlay `other` onto `self`; keys from `other` win on collision.
    pub fn merge_from(&mut self, other: &Payload) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Copy of `self` with `other` overlaid; keys from `other` win on collision.
    pub fn merged_with(&self, other: &Payload) -> Payload {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Payload(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Payload {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Payload {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_keys_win() {
        let a = Payload::from([("a", 1), ("b", 2)]);
        let b = Payload::from([("b", 20), ("c", 30)]);

        let merged = a.merged_with(&b);
        assert_eq!(merged.get("a"), Some(&Value::Int(1)));
        assert_eq!(merged.get("b"), Some(&Value::Int(20)));
        assert_eq!(merged.get("c"), Some(&Value::Int(30)));
        // Source left untouched
        assert_eq!(a.get("b"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_json_round_trip_keeps_int_and_float_apart() {
        let payload: Payload =
            serde_json::from_str(r#"{"n": 10, "x": 2.5, "s": "hi", "l": [1, null]}"#).unwrap();

        assert_eq!(payload.get("n"), Some(&Value::Int(10)));
        assert_eq!(payload.get("x"), Some(&Value::Float(2.5)));
        assert_eq!(payload.get("s").and_then(Value::as_str), Some("hi"));
        assert_eq!(
            payload.get("l"),
            Some(&Value::List(vec![Value::Int(1), Value::Null]))
        );
    }

    #[test]
    fn test_nested_map_from_toml() {
        let payload: Payload = toml::from_str("outer = { inner = true }").unwrap();
        let inner = payload.get("outer").and_then(Value::as_map).unwrap();
        assert_eq!(inner.get("inner").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_display_is_json() {
        let payload = Payload::new().with(PASSTHROUGH, 15);
        assert_eq!(payload.to_string(), r#"{"passthrough":15}"#);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(3).as_float(), Some(3.0));
        assert_eq!(Value::Float(3.5).as_int(), None);
        assert!(Value::Int(1).is_number());
        assert!(!Value::from("1").is_number());
        assert_eq!(Value::Null.type_name(), "null");
    }
}
