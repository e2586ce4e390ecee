//! The filesystem driver (spec §4.4): maps keys onto paths under a root
//! directory, guards against traversal, and watches the tree for changes.

use super::{ChangeKind, Driver, Options, Unwatch, WatchCallback};
use crate::error::{Result, StoreError};
use crate::value::Meta;
use async_trait::async_trait;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Default ignore globs applied during `list_keys` traversal (spec §6.4).
const DEFAULT_IGNORES: &[&str] = &["node_modules", ".git"];

/// Maps a colon-separated key space onto files under `base_dir`.
///
/// # Example
///
/// ```
/// use unistore::driver::FileSystemDriver;
/// use std::path::PathBuf;
///
/// let driver = FileSystemDriver::new(PathBuf::from("/tmp/unistore-example"));
/// ```
pub struct FileSystemDriver {
    base_dir: PathBuf,
    read_only: bool,
    no_clear: bool,
    ignore: Vec<String>,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FileSystemDriver {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            read_only: false,
            no_clear: false,
            ignore: DEFAULT_IGNORES.iter().map(|s| s.to_string()).collect(),
            watcher: Mutex::new(None),
        }
    }

    pub fn read_only(mut self, yes: bool) -> Self {
        self.read_only = yes;
        self
    }

    pub fn no_clear(mut self, yes: bool) -> Self {
        self.no_clear = yes;
        self
    }

    /// Overrides the default ignore globs. A malformed pattern set should
    /// never be fatal (spec §4.4.3) so this setter never fails -- it just
    /// replaces the list outright.
    pub fn with_ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore = patterns;
        self
    }

    /// Maps a relative key to its path under `base_dir`, rejecting
    /// traversal sequences and confirming the resolved path stays under
    /// `base_dir`.
    ///
    /// # Example
    ///
    /// ```
    /// use unistore::driver::FileSystemDriver;
    /// use std::path::PathBuf;
    ///
    /// let driver = FileSystemDriver::new(PathBuf::from("/tmp/unistore-example"));
    /// let path = driver.path_for("users:42").unwrap();
    /// assert_eq!(path, PathBuf::from("/tmp/unistore-example/users/42"));
    /// ```
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        // `key::normalize` already rejects a literal ".." segment; this is a
        // second, path-level check so a future caller bypassing normalize
        // still can't escape base_dir.
        if key.split(':').any(|seg| seg == "..") {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let rel = key.replace(':', "/");
        let joined = self.base_dir.join(&rel);
        let normalized = normalize_lexically(&joined);
        if !normalized.starts_with(&self.base_dir) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(joined)
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.iter().any(|pat| {
            path.components()
                .any(|c| c.as_os_str().to_string_lossy() == pat.as_str())
        })
    }
}

/// Lexical `..`/`.` resolution that doesn't require the path to exist
/// (`Path::canonicalize` does, which would break on not-yet-created files).
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[async_trait]
impl Driver for FileSystemDriver {
    async fn has(&self, key: &str, _opts: &Options) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    async fn get(&self, key: &str, _opts: &Options) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_raw(&self, key: &str, _opts: &Options) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str, opts: &Options) -> Result<()> {
        self.set_raw(key, value.as_bytes(), opts).await
    }

    async fn set_raw(&self, key: &str, bytes: &[u8], _opts: &Options) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{file_name}.unistore-tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str, _opts: &Options) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_meta(&self, key: &str, _opts: &Options) -> Result<Option<Meta>> {
        let path = self.path_for(key)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut meta = Meta::new().with("size", metadata.len());
        if let Ok(mtime) = metadata.modified() {
            meta = meta.with("mtime", to_epoch_seconds(mtime));
        }
        if let Ok(atime) = metadata.accessed() {
            meta = meta.with("atime", to_epoch_seconds(atime));
        }
        if let Ok(ctime) = metadata.created() {
            meta = meta.with("birthtime", to_epoch_seconds(ctime));
        }
        Ok(Some(meta))
    }

    async fn list_keys(&self, base: &str, opts: &Options) -> Result<Vec<String>> {
        let root = self.path_for(base).unwrap_or_else(|_| self.base_dir.clone());
        if tokio::fs::metadata(&root).await.is_err() {
            return Ok(vec![]);
        }
        let max_depth = opts.max_depth();
        let ignore = self.ignore.clone();
        let base_dir = self.base_dir.clone();
        let root_owned = root.clone();

        tokio::task::spawn_blocking(move || {
            let mut walker = WalkDir::new(&root_owned);
            if let Some(depth) = max_depth {
                walker = walker.max_depth(depth);
            }
            let mut keys = Vec::new();
            for entry in walker.into_iter().filter_entry(|e| {
                !ignore
                    .iter()
                    .any(|pat| e.file_name().to_string_lossy() == pat.as_str())
            }) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(_) => continue,
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(&base_dir) {
                    let key = rel.to_string_lossy().replace(['/', '\\'], ":");
                    if !crate::key::is_reserved(&key) {
                        keys.push(key);
                    }
                }
            }
            keys
        })
        .await
        .map_err(|e| StoreError::BackendFailure(e.to_string()))
    }

    async fn clear(&self, base: &str, _opts: &Options) -> Result<()> {
        if self.read_only || self.no_clear {
            return Ok(());
        }
        let root = self.path_for(base)?;
        let mut entries = match tokio::fs::read_dir(&root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.is_ignored(&path) {
                continue;
            }
            if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn watch(&self, callback: WatchCallback) -> Result<Unwatch> {
        let base_dir = self.base_dir.clone();
        // `notify` callbacks run on their own thread; bridge them back with
        // an unbounded channel so the watcher thread never blocks on the
        // async callback consumer.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .map_err(|e| StoreError::BackendFailure(e.to_string()))?;

        if base_dir.exists() {
            watcher
                .watch(&base_dir, RecursiveMode::Recursive)
                .map_err(|e| StoreError::BackendFailure(e.to_string()))?;
        }
        // If base_dir doesn't exist yet, the spec wants a no-op until it
        // appears rather than a failure; polling for its creation is a
        // known gap, not implemented here.

        let base_dir_for_task = self.base_dir.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = match event.kind {
                    EventKind::Remove(_) => ChangeKind::Remove,
                    EventKind::Create(_) | EventKind::Modify(_) => ChangeKind::Update,
                    _ => continue,
                };
                for path in event.paths {
                    if let Ok(rel) = path.strip_prefix(&base_dir_for_task) {
                        let key = rel.to_string_lossy().replace(['/', '\\'], ":");
                        if !key.is_empty() {
                            callback(kind, key);
                        }
                    }
                }
            }
        });

        *self.watcher.lock().unwrap() = Some(watcher);
        Ok(Box::new(move || {
            task.abort();
        }))
    }

    fn capabilities(&self) -> super::Capabilities {
        super::Capabilities::new().with_max_depth()
    }
}

fn to_epoch_seconds(time: std::time::SystemTime) -> i64 {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
