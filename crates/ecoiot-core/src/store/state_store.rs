// ── Snapshot store ──
//
// Holds the last published snapshot behind an atomic pointer. Readers never
// block and always see one snapshot in full; the single writer swaps in a
// new one and notifies subscribers.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use crate::model::{DeviceReading, Snapshot};
use crate::stream::SnapshotStream;

/// Last-known state of every device.
///
/// Publication is totally ordered by cycle id: a snapshot whose cycle is not
/// newer than the current one is discarded, so a late writer can never roll
/// the store back.
pub struct StateStore {
    current: ArcSwap<Snapshot>,
    /// Serializes writers so the pointer swap and the notification happen
    /// in the same order.
    writer: Mutex<()>,
    published: watch::Sender<Arc<Snapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        let initial = Arc::new(Snapshot::empty());
        let (published, _) = watch::channel(Arc::clone(&initial));
        Self {
            current: ArcSwap::new(initial),
            writer: Mutex::new(()),
            published,
        }
    }

    /// Atomically replace the current snapshot.
    ///
    /// Returns `false` (and leaves the store untouched) if `snapshot` is not
    /// newer than what is already published.
    pub fn replace(&self, snapshot: Snapshot) -> bool {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let current_cycle = self.current.load().cycle;
        if snapshot.cycle <= current_cycle {
            debug!(
                cycle = snapshot.cycle,
                current_cycle, "discarding stale snapshot"
            );
            return false;
        }

        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        // `send_replace` updates unconditionally, even with zero receivers.
        self.published.send_replace(snapshot);
        true
    }

    /// The current snapshot (cheap `Arc` clone).
    pub fn read(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// One device's reading from the current snapshot.
    pub fn read_device(&self, device_id: &str) -> Option<Arc<DeviceReading>> {
        self.current.load().get(device_id).cloned()
    }

    /// Cycle id of the current snapshot.
    pub fn cycle(&self) -> u64 {
        self.current.load().cycle
    }

    /// Subscribe to snapshot publications.
    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.published.subscribe())
    }

    /// How long ago the current snapshot was taken, or `None` if nothing
    /// has been published yet.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.current.load().taken_at.map(|t| Utc::now() - t)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    fn snapshot(cycle: u64, ids: &[&str]) -> Snapshot {
        let readings = ids
            .iter()
            .map(|id| {
                let fields = json!({"id": id, "cycle": cycle});
                let reading = DeviceReading::new(fields.as_object().cloned().unwrap());
                ((*id).to_owned(), Arc::new(reading))
            })
            .collect::<BTreeMap<_, _>>();
        Snapshot {
            cycle,
            taken_at: Some(Utc::now()),
            readings,
        }
    }

    #[test]
    fn starts_empty() {
        let store = StateStore::new();
        assert_eq!(store.cycle(), 0);
        assert!(store.read().is_empty());
        assert!(store.read_device("1").is_none());
        assert!(store.data_age().is_none());
    }

    #[test]
    fn replace_swaps_whole_snapshot() {
        let store = StateStore::new();
        assert!(store.replace(snapshot(1, &["1", "2"])));
        assert!(store.replace(snapshot(2, &["2"])));

        let snap = store.read();
        assert_eq!(snap.cycle, 2);
        assert!(!snap.contains("1"), "device 1 must not be carried forward");
        assert_eq!(
            store.read_device("2").unwrap().get("cycle"),
            Some(&json!(2))
        );
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let store = StateStore::new();
        assert!(store.replace(snapshot(5, &["1"])));
        assert!(!store.replace(snapshot(3, &["1", "2"])));
        assert!(!store.replace(snapshot(5, &["2"])));
        assert_eq!(store.cycle(), 5);
        assert!(!store.read().contains("2"));
    }

    #[test]
    fn readers_keep_their_snapshot_after_replace() {
        let store = StateStore::new();
        store.replace(snapshot(1, &["1"]));
        let held = store.read();
        store.replace(snapshot(2, &[]));
        assert_eq!(held.cycle, 1);
        assert!(held.contains("1"));
        assert!(store.read().is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_published_snapshots() {
        let store = StateStore::new();
        let mut sub = store.subscribe();
        assert_eq!(sub.current().cycle, 0);

        store.replace(snapshot(1, &["9"]));
        let next = sub.changed().await.unwrap();
        assert_eq!(next.cycle, 1);
        assert!(next.contains("9"));
    }
}
