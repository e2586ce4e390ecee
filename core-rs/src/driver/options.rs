//! The open transaction-options record every operation accepts (spec §5).

use serde_json::{Map, Value};

/// An open string-to-value map passed through to the driver verbatim.
/// Recognized common fields: `ttl` (set-only, seconds), `removeMeta`
/// (remove-only, boolean), `nativeOnly` (get-meta, boolean), `maxDepth`
/// (list-only).
#[derive(Debug, Clone, Default)]
pub struct Options(pub Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn ttl(&self) -> Option<i64> {
        self.0.get("ttl").and_then(|v| v.as_i64())
    }

    pub fn remove_meta(&self) -> bool {
        self.0.get("removeMeta").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn native_only(&self) -> bool {
        self.0.get("nativeOnly").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.0.get("maxDepth").and_then(|v| v.as_u64()).map(|n| n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_read_recognized_fields() {
        let opts = Options::new().with("ttl", 60).with("maxDepth", 2);
        assert_eq!(opts.ttl(), Some(60));
        assert_eq!(opts.max_depth(), Some(2));
        assert!(!opts.remove_meta());
    }

    #[test]
    fn missing_fields_default_sensibly() {
        let opts = Options::default();
        assert_eq!(opts.ttl(), None);
        assert!(!opts.native_only());
        assert_eq!(opts.max_depth(), None);
    }
}
