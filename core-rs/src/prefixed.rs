//! The prefixed view (spec §4.6): a namespaced façade over a `StorageEngine`
//! that rewrites every key on the way in and strips it on the way out.

use crate::driver::{ChangeKind, Options};
use crate::engine::{EngineCallback, EngineUnwatch, Snapshot, StorageEngine};
use crate::error::Result;
use crate::value::{Meta, Value};
use std::sync::Arc;

/// Wraps `storage` so every key-bearing call is transparently rewritten
/// under `prefix`. An empty prefix returns operations unchanged. Shares the
/// underlying engine, including its watch surface (spec §4.6).
#[derive(Clone)]
pub struct PrefixedView {
    storage: StorageEngine,
    prefix: String,
}

impl PrefixedView {
    pub fn new(storage: StorageEngine, prefix: impl Into<String>) -> Self {
        Self { storage, prefix: prefix.into() }
    }

    fn prefixed(&self, key: &str) -> String {
        crate::key::join(&self.prefix, key)
    }

    fn stripped(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            return key.to_string();
        }
        key.strip_prefix(&self.prefix)
            .map(|rest| rest.trim_start_matches(':').to_string())
            .unwrap_or_else(|| key.to_string())
    }

    pub async fn has(&self, key: &str, opts: &Options) -> Result<bool> {
        self.storage.has(&self.prefixed(key), opts).await
    }

    pub async fn get(&self, key: &str, opts: &Options) -> Result<Option<Value>> {
        self.storage.get(&self.prefixed(key), opts).await
    }

    pub async fn get_raw(&self, key: &str, opts: &Options) -> Result<Option<Vec<u8>>> {
        self.storage.get_raw(&self.prefixed(key), opts).await
    }

    pub async fn set(&self, key: &str, value: &Value, opts: &Options) -> Result<()> {
        self.storage.set(&self.prefixed(key), value, opts).await
    }

    pub async fn set_raw(&self, key: &str, bytes: &[u8], opts: &Options) -> Result<()> {
        self.storage.set_raw(&self.prefixed(key), bytes, opts).await
    }

    pub async fn remove(&self, key: &str, opts: &Options) -> Result<()> {
        self.storage.remove(&self.prefixed(key), opts).await
    }

    pub async fn get_meta(&self, key: &str, opts: &Options) -> Result<Option<Meta>> {
        self.storage.get_meta(&self.prefixed(key), opts).await
    }

    pub async fn list_keys(&self, base: &str, opts: &Options) -> Result<Vec<String>> {
        let keys = self.storage.list_keys(&self.prefixed(base), opts).await?;
        Ok(keys.iter().map(|k| self.stripped(k)).collect())
    }

    pub async fn clear(&self, base: &str, opts: &Options) -> Result<()> {
        self.storage.clear(&self.prefixed(base), opts).await
    }

    pub async fn get_many(
        &self,
        keys: &[String],
        opts: &Options,
    ) -> Result<Vec<(String, Option<Value>)>> {
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed(k)).collect();
        let results = self.storage.get_many(&prefixed, opts).await?;
        Ok(results.into_iter().map(|(k, v)| (self.stripped(&k), v)).collect())
    }

    pub async fn set_many(&self, items: &[(String, Value)], opts: &Options) -> Result<()> {
        let rewritten: Vec<(String, Value)> = items
            .iter()
            .map(|(k, v)| (self.prefixed(k), v.clone()))
            .collect();
        self.storage.set_many(&rewritten, opts).await
    }

    /// Subscribes to changes anywhere under `prefix`, reporting
    /// prefix-stripped keys; events outside the prefix are filtered out.
    pub async fn watch(&self, callback: EngineCallback) -> Result<EngineUnwatch> {
        let prefix = self.prefix.clone();
        let view = self.clone();
        self.storage
            .watch(Arc::new(move |kind: ChangeKind, key: String| {
                if crate::key::starts_with_base(&key, &prefix) {
                    callback(kind, view.stripped(&key));
                }
            }))
            .await
    }

    pub async fn snapshot(&self, base: &str) -> Result<Snapshot> {
        self.storage.snapshot(&self.prefixed(base)).await
    }

    pub async fn restore_snapshot(&self, base: &str, snapshot: &Snapshot) -> Result<()> {
        self.storage.restore_snapshot(&self.prefixed(base), snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;
    use serde_json::json;

    fn view(prefix: &str) -> PrefixedView {
        PrefixedView::new(StorageEngine::new(Arc::new(MemoryDriver::new())), prefix)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let v = view("tenant-a");
        v.set("users:1", &Value::from(json!("alice")), &Options::default()).await.unwrap();
        assert_eq!(
            v.get("users:1", &Options::default()).await.unwrap(),
            Some(Value::String("alice".into()))
        );
    }

    #[tokio::test]
    async fn writes_are_isolated_by_prefix() {
        let storage = StorageEngine::new(Arc::new(MemoryDriver::new()));
        let a = PrefixedView::new(storage.clone(), "tenant-a");
        let b = PrefixedView::new(storage.clone(), "tenant-b");
        a.set("x", &Value::String("a".into()), &Options::default()).await.unwrap();
        assert_eq!(b.get("x", &Options::default()).await.unwrap(), None);
        assert_eq!(
            storage.get("tenant-a:x", &Options::default()).await.unwrap(),
            Some(Value::String("a".into()))
        );
    }

    #[tokio::test]
    async fn list_keys_strips_prefix() {
        let v = view("tenant-a");
        v.set("a", &Value::String("1".into()), &Options::default()).await.unwrap();
        v.set("b:c", &Value::String("1".into()), &Options::default()).await.unwrap();
        let mut keys = v.list_keys("", &Options::default()).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b:c".to_string()]);
    }

    #[tokio::test]
    async fn empty_prefix_is_a_passthrough() {
        let v = view("");
        v.set("a", &Value::String("1".into()), &Options::default()).await.unwrap();
        assert_eq!(v.get("a", &Options::default()).await.unwrap(), Some(Value::String("1".into())));
    }

    #[tokio::test]
    async fn get_many_round_trips_prefix_stripped_keys() {
        let v = view("tenant-a");
        v.set_many(
            &[
                ("a".to_string(), Value::String("1".into())),
                ("b".to_string(), Value::String("2".into())),
            ],
            &Options::default(),
        )
        .await
        .unwrap();
        let got = v.get_many(&["a".to_string(), "b".to_string()], &Options::default()).await.unwrap();
        assert_eq!(got[0], ("a".to_string(), Some(Value::String("1".into()))));
    }
}
