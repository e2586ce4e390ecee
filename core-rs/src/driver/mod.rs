//! The driver capability contract (spec §4.1).
//!
//! A `Driver` has three *required* operations (`has`, `get`, `list_keys`)
//! and a set of *optional* ones. Rather than reaching for reflection, each
//! optional method carries a default implementation: a driver that does not
//! override it gets exactly the degraded behavior the spec calls for --
//! `get_raw` falls back to `get` + raw-decode, mutators silently no-op,
//! `get_meta` returns `None`, batching fans out to parallel singletons,
//! `watch` returns a no-op unwatch, `dispose` is a no-op. Overriding a
//! method is how a concrete driver (`MemoryDriver`, `FileSystemDriver`, ...)
//! declares that it actually supports the capability.

mod capabilities;
mod filesystem;
mod http_client;
mod memory;
mod options;
mod overlay;

pub use capabilities::Capabilities;
pub use filesystem::FileSystemDriver;
pub use http_client::ClientDriver;
pub use memory::MemoryDriver;
pub use options::Options;
pub use overlay::OverlayDriver;

use crate::error::Result;
use crate::value::Meta;
use async_trait::async_trait;
use std::sync::Arc;

/// The kind of change a driver watch callback reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Update,
    Remove,
}

/// Callback a driver invokes with a mount-relative key on every change.
pub type WatchCallback = Arc<dyn Fn(ChangeKind, String) + Send + Sync>;

/// A handle that tears down a watch subscription when called.
pub type Unwatch = Box<dyn FnOnce() + Send + Sync>;

/// A no-op unwatch, returned by drivers (and the engine, before anyone is
/// subscribed) that have nothing to tear down.
pub fn noop_unwatch() -> Unwatch {
    Box::new(|| {})
}

/// A storage backend. The engine hands every method a *relative* key
/// (already stripped of the owning mount's base) and, on the non-raw path,
/// a pre-serialized text value.
#[async_trait]
pub trait Driver: Send + Sync {
    // -- required --

    async fn has(&self, key: &str, opts: &Options) -> Result<bool>;
    async fn get(&self, key: &str, opts: &Options) -> Result<Option<String>>;
    async fn list_keys(&self, base: &str, opts: &Options) -> Result<Vec<String>>;

    // -- optional, each with a spec-mandated degraded default --

    async fn get_raw(&self, key: &str, opts: &Options) -> Result<Option<Vec<u8>>> {
        match self.get(key, opts).await? {
            Some(text) => Ok(Some(crate::serialize::decode_raw(&text))),
            None => Ok(None),
        }
    }

    /// Absence (i.e. not overriding this) makes the driver read-only for
    /// `set`: the engine's call returns silently.
    async fn set(&self, _key: &str, _value: &str, _opts: &Options) -> Result<()> {
        Ok(())
    }

    async fn set_raw(&self, key: &str, bytes: &[u8], opts: &Options) -> Result<()> {
        self.set(key, &crate::serialize::encode_raw(bytes), opts).await
    }

    /// Absence makes the driver read-only for `remove`.
    async fn remove(&self, _key: &str, _opts: &Options) -> Result<()> {
        Ok(())
    }

    async fn get_meta(&self, _key: &str, _opts: &Options) -> Result<Option<Meta>> {
        Ok(None)
    }

    async fn get_many(
        &self,
        items: &[String],
        opts: &Options,
    ) -> Result<Vec<(String, Option<String>)>> {
        let mut out = Vec::with_capacity(items.len());
        for key in items {
            out.push((key.clone(), self.get(key, opts).await?));
        }
        Ok(out)
    }

    async fn set_many(&self, items: &[(String, String)], opts: &Options) -> Result<()> {
        for (key, value) in items {
            self.set(key, value, opts).await?;
        }
        Ok(())
    }

    /// Absence makes `clear` a silent no-op for this driver.
    async fn clear(&self, _base: &str, _opts: &Options) -> Result<()> {
        Ok(())
    }

    async fn watch(&self, _callback: WatchCallback) -> Result<Unwatch> {
        Ok(noop_unwatch())
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }

    /// Capability flags (spec §4.1): does `list_keys` honor `maxDepth`
    /// itself (so the engine can trust pre-filtered results), and does this
    /// driver enforce TTL natively (so the engine must not simulate expiry)?
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareDriver;

    #[async_trait]
    impl Driver for BareDriver {
        async fn has(&self, _key: &str, _opts: &Options) -> Result<bool> {
            Ok(false)
        }
        async fn get(&self, _key: &str, _opts: &Options) -> Result<Option<String>> {
            Ok(None)
        }
        async fn list_keys(&self, _base: &str, _opts: &Options) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn unimplemented_mutators_are_silent_no_ops() {
        let driver = BareDriver;
        driver.set("k", "v", &Options::default()).await.unwrap();
        driver.remove("k", &Options::default()).await.unwrap();
        driver.clear("", &Options::default()).await.unwrap();
    }

    #[tokio::test]
    async fn unimplemented_get_meta_is_none() {
        let driver = BareDriver;
        assert!(driver.get_meta("k", &Options::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unimplemented_get_raw_falls_back_to_get() {
        let driver = BareDriver;
        assert_eq!(driver.get_raw("k", &Options::default()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unimplemented_watch_is_noop() {
        let driver = BareDriver;
        let unwatch = driver.watch(Arc::new(|_, _| {})).await.unwrap();
        unwatch();
    }

    #[test]
    fn default_capabilities_are_conservative() {
        let driver = BareDriver;
        let caps = driver.capabilities();
        assert!(!caps.supports_max_depth);
        assert!(!caps.native_ttl);
    }
}
