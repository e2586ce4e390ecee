//! The mount table (spec §4.2.1, §4.2.5): longest-prefix routing over an
//! ordered list of `(base, driver)` entries.

use crate::driver::Driver;
use crate::error::{Result, StoreError};
use std::sync::Arc;

pub struct Mount {
    pub base: String,
    pub driver: Arc<dyn Driver>,
    pub unwatch: Option<crate::driver::Unwatch>,
}

/// Mount bases are kept sorted by descending length so `route` finds the
/// longest-prefix match on the first hit.
#[derive(Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new(root_driver: Arc<dyn Driver>) -> Self {
        Self {
            mounts: vec![Mount {
                base: String::new(),
                driver: root_driver,
                unwatch: None,
            }],
        }
    }

    pub fn mount(&mut self, base: &str, driver: Arc<dyn Driver>) -> Result<()> {
        if base.is_empty() {
            return Err(StoreError::InvalidKey(
                "cannot mount onto the empty base; it is reserved for the root".to_string(),
            ));
        }
        let normalized = crate::key::normalize(base)?;
        if self.mounts.iter().any(|m| m.base == normalized) {
            return Err(StoreError::InvalidKey(format!(
                "a mount already exists at '{normalized}'"
            )));
        }
        self.mounts.push(Mount {
            base: normalized,
            driver,
            unwatch: None,
        });
        self.mounts.sort_by(|a, b| b.base.len().cmp(&a.base.len()));
        Ok(())
    }

    /// Unmounting the root or an unknown base never errors: root removal is
    /// forbidden outright, an unknown base is simply a no-op (spec §4.2.5).
    pub fn unmount(&mut self, base: &str) -> Result<Option<Mount>> {
        if base.is_empty() {
            return Err(StoreError::InvalidKey("cannot unmount the root".to_string()));
        }
        let normalized = crate::key::normalize(base)?;
        if let Some(idx) = self.mounts.iter().position(|m| m.base == normalized) {
            Ok(Some(self.mounts.remove(idx)))
        } else {
            Ok(None)
        }
    }

    /// `route(key) = argmax{base : key.startsWith(base)}` by length.
    pub fn route(&self, key: &str) -> (&Mount, String) {
        for mount in &self.mounts {
            if crate::key::starts_with_base(key, &mount.base) {
                let relative = key.strip_prefix(&mount.base).unwrap_or(key);
                let relative = relative.trim_start_matches(':');
                return (mount, relative.to_string());
            }
        }
        unreachable!("the root mount (\"\") always matches")
    }

    /// Every mount whose base is a descendant of `base` (and, if
    /// `include_ancestors`, every ancestor too). Used by `clear` (both) and
    /// `list_keys` (descendants only).
    pub fn route_many(&self, base: &str, include_ancestors: bool) -> Vec<&Mount> {
        self.mounts
            .iter()
            .filter(|m| {
                let is_descendant = crate::key::starts_with_base(&m.base, base);
                let is_ancestor = include_ancestors && crate::key::starts_with_base(base, &m.base);
                is_descendant || is_ancestor
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Mount> {
        self.mounts.iter_mut()
    }
}
