//! Watch fan-in (spec §4.2.4): a single subscriber list fed by every
//! mounted driver's own watch, normalized to absolute keys.

use crate::driver::ChangeKind;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the engine hands external subscribers: an absolute key and what
/// happened to it.
pub type EngineCallback = Arc<dyn Fn(ChangeKind, String) + Send + Sync>;

#[derive(Default)]
pub struct Subscribers {
    listeners: BTreeMap<u64, EngineCallback>,
    next_id: u64,
}

impl Subscribers {
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Registers a listener and returns the id used to remove it later.
    pub fn push(&mut self, cb: EngineCallback) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, cb);
        id
    }

    pub fn remove(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    pub fn notify(&self, kind: ChangeKind, key: String) {
        for listener in self.listeners.values() {
            listener(kind, key.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_reaches_every_listener() {
        let mut subs = Subscribers::default();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = count.clone();
            subs.push(Arc::new(move |_, _| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        subs.notify(ChangeKind::Update, "a:b".to_string());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_subscriber_list_reports_empty() {
        assert!(Subscribers::default().is_empty());
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let mut subs = Subscribers::default();
        let count = Arc::new(AtomicUsize::new(0));
        let id = {
            let count = count.clone();
            subs.push(Arc::new(move |_, _| {
                count.fetch_add(1, Ordering::SeqCst);
            }))
        };
        subs.remove(id);
        subs.notify(ChangeKind::Update, "a".to_string());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
