//! The reference in-process driver (spec §4.3).

use super::{Driver, Options};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A concurrency-safe string-to-text mapping. No serialization happens
/// in-process: `get`/`set` move the already-stringified text the engine
/// handed in, so round-tripping through `MemoryDriver` alone is lossless.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn has(&self, key: &str, _opts: &Options) -> Result<bool> {
        Ok(self.data.read().unwrap().contains_key(key))
    }

    async fn get(&self, key: &str, _opts: &Options) -> Result<Option<String>> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    async fn list_keys(&self, base: &str, _opts: &Options) -> Result<Vec<String>> {
        let base = base.trim_end_matches(':');
        let data = self.data.read().unwrap();
        Ok(data
            .keys()
            .filter(|k| crate::key::starts_with_base(k, base))
            .cloned()
            .collect())
    }

    async fn set(&self, key: &str, value: &str, _opts: &Options) -> Result<()> {
        self.data.write().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str, _opts: &Options) -> Result<()> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    async fn clear(&self, base: &str, _opts: &Options) -> Result<()> {
        let base = base.trim_end_matches(':');
        let mut data = self.data.write().unwrap();
        let doomed: Vec<String> = data
            .keys()
            .filter(|k| crate::key::starts_with_base(k, base))
            .cloned()
            .collect();
        for key in doomed {
            data.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let driver = MemoryDriver::new();
        driver.set("a:b", "v1", &Options::default()).await.unwrap();
        assert_eq!(driver.get("a:b", &Options::default()).await.unwrap(), Some("v1".into()));
    }

    #[tokio::test]
    async fn has_reflects_presence() {
        let driver = MemoryDriver::new();
        assert!(!driver.has("x", &Options::default()).await.unwrap());
        driver.set("x", "1", &Options::default()).await.unwrap();
        assert!(driver.has("x", &Options::default()).await.unwrap());
    }

    #[tokio::test]
    async fn remove_deletes_key() {
        let driver = MemoryDriver::new();
        driver.set("x", "1", &Options::default()).await.unwrap();
        driver.remove("x", &Options::default()).await.unwrap();
        assert_eq!(driver.get("x", &Options::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_filters_by_base() {
        let driver = MemoryDriver::new();
        for k in ["a", "a:b", "other"] {
            driver.set(k, "1", &Options::default()).await.unwrap();
        }
        let mut under_a = driver.list_keys("a", &Options::default()).await.unwrap();
        under_a.sort();
        assert_eq!(under_a, vec!["a".to_string(), "a:b".to_string()]);
    }

    #[tokio::test]
    async fn clear_removes_subtree_only() {
        let driver = MemoryDriver::new();
        driver.set("a:b", "1", &Options::default()).await.unwrap();
        driver.set("other", "1", &Options::default()).await.unwrap();
        driver.clear("a", &Options::default()).await.unwrap();
        assert!(!driver.has("a:b", &Options::default()).await.unwrap());
        assert!(driver.has("other", &Options::default()).await.unwrap());
    }

    #[tokio::test]
    async fn has_no_watch_support() {
        let driver = MemoryDriver::new();
        let unwatch = driver.watch(std::sync::Arc::new(|_, _| {})).await.unwrap();
        unwatch();
    }
}
