//! Data models for runlink: tagged scalar values and the key/value maps
//! handed to logging calls.

use std::collections::btree_map::{self, BTreeMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunlinkError};

/// A single scalar value. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Double(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(v as f64)
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
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Converts one entry of a dynamically typed document. Anything outside
/// {integer, double, text} is a caller error.
fn json_to_value(key: &str, v: serde_json::Value) -> Result<Value> {
    let invalid = |found: &'static str| RunlinkError::InvalidValueType {
        key: key.to_string(),
        found,
    };
    match v {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if n.is_u64() {
                Err(invalid("u64 out of range"))
            } else {
                n.as_f64().map(Value::Double).ok_or_else(|| invalid("number"))
            }
        }
        serde_json::Value::String(s) => Ok(Value::Text(s)),
        serde_json::Value::Bool(_) => Err(invalid("bool")),
        serde_json::Value::Null => Err(invalid("null")),
        serde_json::Value::Array(_) => Err(invalid("array")),
        serde_json::Value::Object(_) => Err(invalid("object")),
    }
}

fn yaml_to_value(key: &str, v: serde_yaml::Value) -> Result<Value> {
    let invalid = |found: &'static str| RunlinkError::InvalidValueType {
        key: key.to_string(),
        found,
    };
    match v {
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if n.is_u64() {
                Err(invalid("u64 out of range"))
            } else {
                n.as_f64().map(Value::Double).ok_or_else(|| invalid("number"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::Text(s)),
        serde_yaml::Value::Bool(_) => Err(invalid("bool")),
        serde_yaml::Value::Null => Err(invalid("null")),
        serde_yaml::Value::Sequence(_) => Err(invalid("sequence")),
        serde_yaml::Value::Mapping(_) => Err(invalid("mapping")),
        serde_yaml::Value::Tagged(_) => Err(invalid("tagged")),
    }
}

/// Mapping from non-empty string keys to [`Value`]s: the unit of data passed
/// to a logging call. Keys are unique; iteration order is by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeyValueMap {
    entries: BTreeMap<String, Value>,
}

impl KeyValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from `(key, value)` pairs. A repeated key keeps its last value.
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k, v)?;
        }
        Ok(map)
    }

    /// Insert or replace the value for `key`, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        if key.is_empty() {
            return Err(RunlinkError::EmptyKey);
        }
        Ok(self.entries.insert(key, value.into()))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a KeyValueMap {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for KeyValueMap {
    type Error = RunlinkError;

    fn try_from(doc: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut map = Self::new();
        for (k, v) in doc {
            let value = json_to_value(&k, v)?;
            map.insert(k, value)?;
        }
        Ok(map)
    }
}

impl TryFrom<serde_json::Value> for KeyValueMap {
    type Error = RunlinkError;

    fn try_from(doc: serde_json::Value) -> Result<Self> {
        match doc {
            serde_json::Value::Object(obj) => Self::try_from(obj),
            other => Err(RunlinkError::Other(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

impl TryFrom<serde_yaml::Mapping> for KeyValueMap {
    type Error = RunlinkError;

    fn try_from(doc: serde_yaml::Mapping) -> Result<Self> {
        let mut map = Self::new();
        for (k, v) in doc {
            let key = match k {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(RunlinkError::Other(format!(
                        "mapping keys must be strings, got {other:?}"
                    )))
                }
            };
            let value = yaml_to_value(&key, v)?;
            map.insert(key, value)?;
        }
        Ok(map)
    }
}

// Same rules as document conversion: integers that do not fit `i64` are
// rejected, never widened to doubles.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        json_to_value("value", raw).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for KeyValueMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let doc = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        KeyValueMap::try_from(doc).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let mut map = KeyValueMap::new();
        assert!(matches!(map.insert("", 1), Err(RunlinkError::EmptyKey)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_repeated_key_keeps_last() {
        let map = KeyValueMap::from_pairs([("a", Value::Int(1)), ("a", Value::Double(2.0))]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a"), Some(&Value::Double(2.0)));
    }

    #[test]
    fn test_json_conversion() {
        let doc = serde_json::json!({"lr": 0.01, "epochs": 10, "opt": "adam"});
        let map = KeyValueMap::try_from(doc).unwrap();
        assert_eq!(map.get("lr"), Some(&Value::Double(0.01)));
        assert_eq!(map.get("epochs"), Some(&Value::Int(10)));
        assert_eq!(map.get("opt"), Some(&Value::Text("adam".into())));
    }

    #[test]
    fn test_json_bool_is_invalid_type() {
        let doc = serde_json::json!({"ok": 1, "flag": true});
        let err = KeyValueMap::try_from(doc).unwrap_err();
        match err {
            RunlinkError::InvalidValueType { key, found } => {
                assert_eq!(key, "flag");
                assert_eq!(found, "bool");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_yaml_conversion() {
        let doc: serde_yaml::Mapping = serde_yaml::from_str("a: 1\nb: 2.5\nc: x\n").unwrap();
        let map = KeyValueMap::try_from(doc).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("b"), Some(&Value::Double(2.5)));

        let bad: serde_yaml::Mapping = serde_yaml::from_str("a: [1, 2]\n").unwrap();
        assert!(matches!(
            KeyValueMap::try_from(bad),
            Err(RunlinkError::InvalidValueType { found: "sequence", .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_empty_key() {
        let res: std::result::Result<KeyValueMap, _> = serde_json::from_str(r#"{"": 1}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_value_deserialize_matches_document_rules() {
        assert_eq!(serde_json::from_str::<Value>("7").unwrap(), Value::Int(7));
        assert_eq!(serde_json::from_str::<Value>("0.5").unwrap(), Value::Double(0.5));
        assert_eq!(serde_json::from_str::<Value>(r#""x""#).unwrap(), Value::from("x"));
        assert_eq!(serde_yaml::from_str::<Value>("-3").unwrap(), Value::Int(-3));

        let big = format!("{}", u64::MAX);
        assert!(serde_json::from_str::<Value>(&big).is_err());
        assert!(KeyValueMap::try_from(serde_json::from_str::<serde_json::Value>(&format!(r#"{{"n": {big}}}"#)).unwrap()).is_err());
        assert!(serde_json::from_str::<Value>("true").is_err());
        assert!(serde_json::from_str::<Value>("null").is_err());
    }
}
