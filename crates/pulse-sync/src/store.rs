//! Published per-source state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use pulse_sources::{Normalized, SourceId};
use serde::Serialize;

/// Fetch health for one source. The last error string sticks around until
/// that source's next successful fetch clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceHealth {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Snapshot slots, one per source. A refresh builds a complete snapshot
/// and swaps it in whole; readers hold an `Arc` to whichever snapshot was
/// current when they looked, so they never observe a half-written one.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: RwLock<HashMap<SourceId, Arc<Normalized>>>,
    health: RwLock<HashMap<SourceId, SourceHealth>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, source: SourceId, snapshot: Normalized) {
        let mut slots = self.snapshots.write().expect("snapshot lock poisoned");
        slots.insert(source, Arc::new(snapshot));
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<Normalized>> {
        let slots = self.snapshots.read().expect("snapshot lock poisoned");
        slots.get(&source).cloned()
    }

    pub fn record_success(&self, source: SourceId, at: DateTime<Utc>) {
        let mut health = self.health.write().expect("health lock poisoned");
        let entry = health.entry(source).or_default();
        entry.last_success = Some(at);
        entry.last_error = None;
    }

    pub fn record_error(&self, source: SourceId, message: String) {
        let mut health = self.health.write().expect("health lock poisoned");
        health.entry(source).or_default().last_error = Some(message);
    }

    pub fn health(&self, source: SourceId) -> SourceHealth {
        let health = self.health.read().expect("health lock poisoned");
        health.get(&source).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn publish_replaces_the_whole_snapshot() {
        let store = SnapshotStore::new();
        let mut first = BTreeMap::new();
        first.insert("Acme".to_string(), pulse_core::TypedRecord::new());
        store.publish(SourceId::Directory, Normalized::Single(first));

        let held = store.get(SourceId::Directory).unwrap();
        assert_eq!(held.key_count(), 1);

        // A reader holding the old Arc keeps seeing the old snapshot.
        store.publish(SourceId::Directory, Normalized::Single(BTreeMap::new()));
        assert_eq!(held.key_count(), 1);
        assert_eq!(store.get(SourceId::Directory).unwrap().key_count(), 0);
    }

    #[test]
    fn errors_persist_until_the_next_success() {
        let store = SnapshotStore::new();
        store.record_error(SourceId::Ads, "http status 403".to_string());
        assert_eq!(
            store.health(SourceId::Ads).last_error.as_deref(),
            Some("http status 403")
        );

        store.record_success(SourceId::Ads, Utc::now());
        let health = store.health(SourceId::Ads);
        assert!(health.last_error.is_none());
        assert!(health.last_success.is_some());
    }
}
