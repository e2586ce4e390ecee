//! Snapshot format (spec §4.2.6, §6.2): a mount-relative-key-to-text map,
//! self-describing enough to restore into any driver via the raw text
//! envelope (§4.7).

use std::collections::BTreeMap;

/// A mapping from `key[len(base):]` to its raw-encoded text representation.
pub type Snapshot = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_a_plain_sorted_map() {
        let mut snap: Snapshot = Snapshot::new();
        snap.insert("b".to_string(), "2".to_string());
        snap.insert("a".to_string(), "1".to_string());
        let keys: Vec<&String> = snap.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
