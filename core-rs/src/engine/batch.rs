//! Batching support (spec §4.2.3): group a set of keys by the mount that
//! owns them, so the engine can call a driver's batch op exactly once per
//! driver instead of once per key.

use super::mount::MountTable;
use crate::driver::Driver;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One mount's share of a batch: the driver instance itself (so callers
/// never need a second table lookup while issuing the batch call) and the
/// `(absolute_key, relative_key)` pairs routed to it, in original order.
pub struct Batch {
    pub driver: Arc<dyn Driver>,
    pub items: Vec<(String, String)>,
}

/// Groups `keys` by their owning mount, preserving per-mount item order.
pub fn group_by_mount(table: &MountTable, keys: &[String]) -> Vec<Batch> {
    let mut by_base: BTreeMap<String, (Arc<dyn Driver>, Vec<(String, String)>)> = BTreeMap::new();
    for key in keys {
        let (mount, relative) = table.route(key);
        by_base
            .entry(mount.base.clone())
            .or_insert_with(|| (mount.driver.clone(), Vec::new()))
            .1
            .push((key.clone(), relative));
    }
    by_base
        .into_values()
        .map(|(driver, items)| Batch { driver, items })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;

    #[test]
    fn groups_keys_by_owning_mount() {
        let mut table = MountTable::new(Arc::new(MemoryDriver::new()));
        table.mount("users", Arc::new(MemoryDriver::new())).unwrap();

        let keys = vec!["users:1".to_string(), "other:1".to_string(), "users:2".to_string()];
        let batches = group_by_mount(&table, &keys);

        assert_eq!(batches.len(), 2);
        let users_batch = batches
            .iter()
            .find(|b| b.items.iter().any(|(k, _)| k == "users:1"))
            .unwrap();
        assert_eq!(users_batch.items.len(), 2);
        assert!(users_batch.items.iter().all(|(_, rel)| !rel.starts_with("users")));
    }

    #[test]
    fn single_mount_groups_everything_together() {
        let table = MountTable::new(Arc::new(MemoryDriver::new()));
        let keys = vec!["a".to_string(), "b".to_string()];
        let batches = group_by_mount(&table, &keys);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].items.len(), 2);
    }
}
