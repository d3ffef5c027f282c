//! Snapshot store with per-key atomic upserts and subscriptions
//!
//! The store is the single mutation point for snapshots. Each key's entry
//! is mutated under its map entry lock, so writers for the same key are
//! serialized and subscribers observe generations in non-decreasing order
//! (the broadcast send happens under the same lock). Slow subscribers may
//! miss intermediate generations but can never see a regression.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use brokerscope_api::{BrokerKey, PostureSnapshot};

const SUBSCRIBE_CAPACITY: usize = 256;

struct StoreEntry {
    /// Present only once the first correlation cycle has written
    snapshot: Option<PostureSnapshot>,
    tx: broadcast::Sender<PostureSnapshot>,
}

impl StoreEntry {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBE_CAPACITY);
        Self { snapshot: None, tx }
    }
}

/// Holds the current posture snapshot per broker key
#[derive(Default)]
pub struct SnapshotStore {
    entries: DashMap<BrokerKey, StoreEntry>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Get the current snapshot for a key
    pub fn get(&self, key: &BrokerKey) -> Option<PostureSnapshot> {
        self.entries.get(key).and_then(|e| e.snapshot.clone())
    }

    /// All current snapshots
    pub fn list(&self) -> Vec<PostureSnapshot> {
        self.entries
            .iter()
            .filter_map(|e| e.snapshot.clone())
            .collect()
    }

    /// Keys with a snapshot present
    pub fn keys(&self) -> Vec<BrokerKey> {
        self.entries
            .iter()
            .filter(|e| e.snapshot.is_some())
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn contains(&self, key: &BrokerKey) -> bool {
        self.entries
            .get(key)
            .map(|e| e.snapshot.is_some())
            .unwrap_or(false)
    }

    /// Replace the snapshot for a key through a mutator, atomically with
    /// respect to other writers for the same key.
    ///
    /// The store owns the bookkeeping invariants: the generation is always
    /// the previous one plus one, the update timestamp is set here, and
    /// the overall health is recomputed so it can never be set
    /// independently. The mutator must not call back into the store.
    pub fn upsert<F>(&self, key: &BrokerKey, mutator: F) -> PostureSnapshot
    where
        F: FnOnce(Option<&PostureSnapshot>) -> PostureSnapshot,
    {
        let mut entry = match self.entries.entry(key.clone()) {
            Entry::Occupied(e) => e.into_ref(),
            Entry::Vacant(v) => v.insert(StoreEntry::new()),
        };
        let prev_generation = entry.snapshot.as_ref().map(|s| s.generation).unwrap_or(0);

        let mut next = mutator(entry.snapshot.as_ref());
        next.generation = prev_generation + 1;
        next.last_updated_at = Utc::now();
        next.refresh_health();

        entry.snapshot = Some(next.clone());
        let _ = entry.tx.send(next.clone());
        next
    }

    /// Patch an existing snapshot in place; a no-op when the key has no
    /// snapshot yet (the poller never creates snapshots, correlation does).
    pub fn patch<F>(&self, key: &BrokerKey, f: F) -> Option<PostureSnapshot>
    where
        F: FnOnce(&mut PostureSnapshot),
    {
        let mut entry = self.entries.get_mut(key)?;
        let snapshot = entry.snapshot.as_mut()?;

        f(snapshot);
        snapshot.generation += 1;
        snapshot.last_updated_at = Utc::now();
        snapshot.refresh_health();

        let updated = snapshot.clone();
        let _ = entry.tx.send(updated.clone());
        Some(updated)
    }

    /// Remove a key entirely; subscribers observe the channel closing
    pub fn remove(&self, key: &BrokerKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Subscribe to every generation change for a key.
    ///
    /// Delivery is at-least-once in non-decreasing generation order;
    /// subscribing before the first write is allowed.
    pub fn subscribe(&self, key: &BrokerKey) -> broadcast::Receiver<PostureSnapshot> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(e) => e.get().tx.subscribe(),
            Entry::Vacant(v) => v.insert(StoreEntry::new()).tx.subscribe(),
        }
    }
}
