//! The storage engine (spec §4.2): the mount table plus routing, batching,
//! watch fan-in, and snapshot/restore built on top of it.

mod batch;
mod mount;
mod snapshot;
mod watch;

pub use mount::MountTable;
pub use snapshot::Snapshot;
pub use watch::EngineCallback;

use crate::driver::{ChangeKind, Driver, Options};
use crate::error::Result;
use crate::value::{Meta, Value};
use std::sync::{Arc, RwLock as StdRwLock};

/// A handle that tears down an engine-level watch subscription when called.
pub type EngineUnwatch = Box<dyn FnOnce() + Send + Sync>;

struct Inner {
    mounts: StdRwLock<MountTable>,
    subscribers: StdRwLock<watch::Subscribers>,
}

/// The façade every caller talks to. Cheaply cloneable: clones share the
/// same mount table and subscriber list (spec §4.6 relies on this for
/// `PrefixedView`).
#[derive(Clone)]
pub struct StorageEngine(Arc<Inner>);

impl StorageEngine {
    /// Creates an engine whose root mount (`""`) is `root_driver`. Pass
    /// `MemoryDriver::new()` for the spec's documented default.
    pub fn new(root_driver: Arc<dyn Driver>) -> Self {
        Self(Arc::new(Inner {
            mounts: StdRwLock::new(MountTable::new(root_driver)),
            subscribers: StdRwLock::new(watch::Subscribers::default()),
        }))
    }

    pub fn mount(&self, base: &str, driver: Arc<dyn Driver>) -> Result<()> {
        self.0.mounts.write().unwrap().mount(base, driver)
    }

    /// Unmounts `base`, tearing down its watch subscription first if one is
    /// registered under an active engine-level subscription.
    pub fn unmount(&self, base: &str) -> Result<()> {
        let removed = self.0.mounts.write().unwrap().unmount(base)?;
        if let Some(mut mount) = removed {
            if let Some(unwatch) = mount.unwatch.take() {
                unwatch();
            }
        }
        Ok(())
    }

    fn route(&self, key: &str) -> (Arc<dyn Driver>, String, String) {
        let mounts = self.0.mounts.read().unwrap();
        let (mount, relative) = mounts.route(key);
        (mount.driver.clone(), mount.base.clone(), relative)
    }

    pub async fn has(&self, key: &str, opts: &Options) -> Result<bool> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        driver.has(&relative, opts).await
    }

    pub async fn get(&self, key: &str, opts: &Options) -> Result<Option<Value>> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        match driver.get(&relative, opts).await? {
            Some(text) => Ok(Some(crate::serialize::parse(&text))),
            None => Ok(None),
        }
    }

    pub async fn get_raw(&self, key: &str, opts: &Options) -> Result<Option<Vec<u8>>> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        driver.get_raw(&relative, opts).await
    }

    /// Routes a `Value` to the raw or text path depending on its shape:
    /// `Bytes` goes through `setRaw`, everything else is stringified and
    /// goes through `set` (capability gaps are handled by the driver's own
    /// default methods, not here).
    pub async fn set(&self, key: &str, value: &Value, opts: &Options) -> Result<()> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        match value {
            Value::Bytes(bytes) => driver.set_raw(&relative, bytes, opts).await,
            other => {
                let text = crate::serialize::stringify(other)?;
                driver.set(&relative, &text, opts).await
            }
        }
    }

    pub async fn set_raw(&self, key: &str, bytes: &[u8], opts: &Options) -> Result<()> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        driver.set_raw(&relative, bytes, opts).await
    }

    pub async fn remove(&self, key: &str, opts: &Options) -> Result<()> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        driver.remove(&relative, opts).await
    }

    pub async fn get_meta(&self, key: &str, opts: &Options) -> Result<Option<Meta>> {
        let key = crate::key::normalize(key)?;
        let (driver, _, relative) = self.route(&key);
        driver.get_meta(&relative, opts).await
    }

    /// Enumerates every key at or under `base` across all descendant
    /// mounts. A single mount's failure is swallowed -- it contributes no
    /// keys rather than failing the whole call (spec §4.2.2).
    pub async fn list_keys(&self, base: &str, opts: &Options) -> Result<Vec<String>> {
        let base = crate::key::normalize(base)?;
        let descendants: Vec<(Arc<dyn Driver>, String)> = {
            let mounts = self.0.mounts.read().unwrap();
            mounts
                .route_many(&base, false)
                .into_iter()
                .map(|m| (m.driver.clone(), m.base.clone()))
                .collect()
        };

        let mut out = std::collections::BTreeSet::new();
        for (driver, mount_base) in descendants {
            let relative_base = relative_base_for(&base, &mount_base);
            let keys = match driver.list_keys(&relative_base, opts).await {
                Ok(keys) => keys,
                Err(_) => continue,
            };
            let trusts_depth = driver.capabilities().supports_max_depth;
            for key in keys {
                let absolute = crate::key::join(&mount_base, &key);
                if crate::key::is_reserved(&absolute) {
                    continue;
                }
                let matches = if trusts_depth {
                    crate::key::starts_with_base(&absolute, &base)
                } else {
                    crate::key::matches_base(&absolute, &base, opts.max_depth())
                };
                if matches {
                    out.insert(absolute);
                }
            }
        }
        Ok(out.into_iter().collect())
    }

    /// Fans out to every descendant **and ancestor** mount that supports
    /// `clear` (spec §4.2.2); a mount's failure is logged and skipped.
    pub async fn clear(&self, base: &str, opts: &Options) -> Result<()> {
        let base = crate::key::normalize(base)?;
        let targets: Vec<(Arc<dyn Driver>, String)> = {
            let mounts = self.0.mounts.read().unwrap();
            mounts
                .route_many(&base, true)
                .into_iter()
                .map(|m| (m.driver.clone(), m.base.clone()))
                .collect()
        };
        for (driver, mount_base) in targets {
            let relative_base = relative_base_for(&base, &mount_base);
            if let Err(e) = driver.clear(&relative_base, opts).await {
                tracing::warn!(mount = %mount_base, error = %e, "clear failed on mount, continuing");
            }
        }
        Ok(())
    }

    pub async fn get_many(
        &self,
        keys: &[String],
        opts: &Options,
    ) -> Result<Vec<(String, Option<Value>)>> {
        let normalized: Vec<String> = keys
            .iter()
            .map(|k| crate::key::normalize(k))
            .collect::<Result<_>>()?;
        let batches = {
            let mounts = self.0.mounts.read().unwrap();
            batch::group_by_mount(&mounts, &normalized)
        };

        let mut results: std::collections::HashMap<String, Option<Value>> =
            std::collections::HashMap::with_capacity(normalized.len());
        for b in batches {
            let relative_items: Vec<String> = b.items.iter().map(|(_, rel)| rel.clone()).collect();
            let fetched = b.driver.get_many(&relative_items, opts).await?;
            let by_relative: std::collections::HashMap<String, Option<String>> =
                fetched.into_iter().collect();
            for (absolute, relative) in &b.items {
                let value = by_relative
                    .get(relative)
                    .cloned()
                    .flatten()
                    .map(|text| crate::serialize::parse(&text));
                results.insert(absolute.clone(), value);
            }
        }
        Ok(normalized
            .into_iter()
            .map(|k| {
                let v = results.remove(&k).unwrap_or(None);
                (k, v)
            })
            .collect())
    }

    pub async fn set_many(&self, items: &[(String, Value)], opts: &Options) -> Result<()> {
        let keys: Vec<String> = items
            .iter()
            .map(|(k, _)| crate::key::normalize(k))
            .collect::<Result<_>>()?;
        let values: std::collections::HashMap<String, String> = {
            let mut map = std::collections::HashMap::with_capacity(items.len());
            for ((_, value), key) in items.iter().zip(keys.iter()) {
                map.insert(key.clone(), crate::serialize::stringify(value)?);
            }
            map
        };
        let batches = {
            let mounts = self.0.mounts.read().unwrap();
            batch::group_by_mount(&mounts, &keys)
        };
        for b in batches {
            let relative_items: Vec<(String, String)> = b
                .items
                .iter()
                .map(|(abs, rel)| (rel.clone(), values.get(abs).cloned().unwrap_or_default()))
                .collect();
            b.driver.set_many(&relative_items, opts).await?;
        }
        Ok(())
    }

    /// Registers an external subscriber. The first registration starts a
    /// driver-level watch on every mount that supports one; the last
    /// deregistration tears them all down (spec §4.2.4).
    pub async fn watch(&self, callback: EngineCallback) -> Result<EngineUnwatch> {
        let id = {
            let mut subs = self.0.subscribers.write().unwrap();
            let id = subs.push(callback);
            (id, subs.len())
        };
        let (id, count) = id;
        if count == 1 {
            self.start_driver_watches().await;
        }

        let engine = self.clone();
        Ok(Box::new(move || {
            engine.remove_subscriber(id);
        }))
    }

    async fn start_driver_watches(&self) {
        let targets: Vec<(Arc<dyn Driver>, String)> = {
            let mounts = self.0.mounts.read().unwrap();
            mounts.iter().map(|m| (m.driver.clone(), m.base.clone())).collect()
        };
        for (driver, base) in targets {
            let inner = self.0.clone();
            let cb_base = base.clone();
            let unwatch = driver
                .watch(Arc::new(move |kind: ChangeKind, relative: String| {
                    let absolute = crate::key::join(&cb_base, &relative);
                    inner.subscribers.read().unwrap().notify(kind, absolute);
                }))
                .await;
            if let Ok(unwatch) = unwatch {
                let mut mounts = self.0.mounts.write().unwrap();
                // The mount may have been unmounted while we awaited the
                // driver's `watch` call; find it by base rather than
                // trusting a stale index.
                let found = mounts.iter_mut().find(|m| m.base == base);
                if let Some(m) = found {
                    m.unwatch = Some(unwatch);
                }
            } else {
                tracing::warn!(mount = %base, "driver watch failed to start, continuing");
            }
        }
    }

    fn remove_subscriber(&self, id: u64) {
        let now_empty = {
            let mut subs = self.0.subscribers.write().unwrap();
            subs.remove(id);
            subs.is_empty()
        };
        if now_empty {
            let mut mounts = self.0.mounts.write().unwrap();
            for mount in mounts.iter_mut() {
                if let Some(unwatch) = mount.unwatch.take() {
                    unwatch();
                }
            }
        }
    }

    /// Enumerates `base`'s subtree and fetches each key via the raw path,
    /// re-encoding into the text-safe snapshot format (spec §4.2.6).
    pub async fn snapshot(&self, base: &str) -> Result<Snapshot> {
        let base = crate::key::normalize(base)?;
        let keys = self.list_keys(&base, &Options::default()).await?;
        let mut out = Snapshot::new();
        for key in keys {
            let relative = key.strip_prefix(&base).unwrap_or(&key).trim_start_matches(':');
            let bytes = self.get_raw(&key, &Options::default()).await?.unwrap_or_default();
            out.insert(relative.to_string(), crate::serialize::encode_raw(&bytes));
        }
        Ok(out)
    }

    pub async fn restore_snapshot(&self, base: &str, snapshot: &Snapshot) -> Result<()> {
        let base = crate::key::normalize(base)?;
        for (relative, text) in snapshot {
            let absolute = crate::key::join(&base, relative);
            let bytes = crate::serialize::decode_raw(text);
            self.set_raw(&absolute, &bytes, &Options::default()).await?;
        }
        Ok(())
    }

    /// Stops every watch, disposes every driver, and resets the engine to a
    /// fresh empty state rooted at a bare `MemoryDriver`.
    pub async fn dispose(&self) -> Result<()> {
        let drivers: Vec<Arc<dyn Driver>> = {
            let mut mounts = self.0.mounts.write().unwrap();
            for mount in mounts.iter_mut() {
                if let Some(unwatch) = mount.unwatch.take() {
                    unwatch();
                }
            }
            mounts.iter().map(|m| m.driver.clone()).collect()
        };
        for driver in drivers {
            let _ = driver.dispose().await;
        }
        *self.0.mounts.write().unwrap() =
            MountTable::new(Arc::new(crate::driver::MemoryDriver::new()));
        *self.0.subscribers.write().unwrap() = watch::Subscribers::default();
        Ok(())
    }
}

/// The portion of `base` not already covered by `mount_base`, used both when
/// `mount_base` is an ancestor of `base` (the common case: a descendant
/// mount only needs the remainder) and when `mount_base` is at or beneath
/// `base` (the mount owns its entire subtree, so the relative base is the
/// mount's own root, `""`).
fn relative_base_for(base: &str, mount_base: &str) -> String {
    if crate::key::starts_with_base(base, mount_base) {
        let rest = base.strip_prefix(mount_base).unwrap_or(base);
        rest.trim_start_matches(':').to_string()
    } else {
        String::new()
    }
}
