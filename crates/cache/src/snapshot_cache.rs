use std::time::{Duration, Instant};

use dashmap::DashMap;
use model::snapshot::SnapshotFrame;

/// Persistent mirror the cache rehydrates from at startup (spec §4.1
/// `pull_from_storage`, §9 "cache rehydration"). Implemented by the durable
/// store.
#[async_trait::async_trait]
pub trait SnapshotBackingStore: Send + Sync {
    async fn load_all(&self) -> Vec<SnapshotFrame>;
}

struct Entry {
    frame: SnapshotFrame,
    expires_at: Instant,
}

/// The keyed, TTL-bounded snapshot store from spec §4.1. One instance per
/// entity kind, each with its own fixed TTL (6h journeys, 12h servers and
/// dispatch posts).
///
/// Concurrency: `DashMap` shards give fully concurrent readers and
/// per-shard write serialization, which is already per-primary-key
/// serialization for the write patterns this cache sees (read-modify-write
/// on a single key never happens across two call sites at once here).
pub struct SnapshotCache {
    ttl: Duration,
    primary: DashMap<String, Entry>,
    /// secondary key -> primary key
    secondary_index: DashMap<String, String>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            primary: DashMap::new(),
            secondary_index: DashMap::new(),
        }
    }

    fn is_live(entry: &Entry) -> bool {
        entry.expires_at > Instant::now()
    }

    pub fn set(&self, frame: SnapshotFrame) {
        let primary_key = frame.primary_key().to_string();
        let secondary_key = frame.secondary_key().to_string();
        self.secondary_index
            .insert(secondary_key, primary_key.clone());
        self.primary.insert(
            primary_key,
            Entry {
                frame,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Bypasses the normal write path for frames arriving over the event
    /// bus (spec §4.1 `update_local`): same effect, but never re-published.
    pub fn update_local(&self, frame: SnapshotFrame) {
        self.set(frame);
    }

    pub fn find_by_primary(&self, key: &str) -> Option<SnapshotFrame> {
        let entry = self.primary.get(key)?;
        if Self::is_live(&entry) {
            Some(entry.frame.clone())
        } else {
            None
        }
    }

    pub fn find_by_secondary(&self, key: &str) -> Option<SnapshotFrame> {
        let primary_key = self.secondary_index.get(key)?.clone();
        self.find_by_primary(&primary_key)
    }

    /// Entries whose secondary key falls outside `known`, used to detect
    /// upstream disappearances (spec §4.1).
    pub fn find_by_secondary_not_in(&self, known: &std::collections::HashSet<String>) -> Vec<SnapshotFrame> {
        self.secondary_index
            .iter()
            .filter(|entry| !known.contains(entry.key()))
            .filter_map(|entry| self.find_by_primary(entry.value()))
            .collect()
    }

    pub fn remove_by_primary(&self, key: &str) -> Option<SnapshotFrame> {
        let (_, entry) = self.primary.remove(key)?;
        let secondary_key = entry.frame.secondary_key().to_string();
        self.secondary_index.remove(&secondary_key);
        Some(entry.frame)
    }

    pub fn remove_local_by_primary(&self, key: &str) -> Option<SnapshotFrame> {
        self.remove_by_primary(key)
    }

    /// A consistent list of all live frames at call time.
    pub fn snapshot(&self) -> Vec<SnapshotFrame> {
        self.primary
            .iter()
            .filter(|entry| Self::is_live(entry.value()))
            .map(|entry| entry.value().frame.clone())
            .collect()
    }

    /// Rehydrates from the backing store. Must run to completion before any
    /// event-bus subscription is allowed to deliver updates (spec §9).
    pub async fn pull_from_storage(&self, store: &dyn SnapshotBackingStore) {
        for frame in store.load_all().await {
            self.set(frame);
        }
        tracing::info!(count = self.primary.len(), "snapshot cache rehydrated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::ids::ServerId;
    use model::server::{Region, Server};
    use model::snapshot::{FrameId, SnapshotPayload};

    fn frame(primary: &str, secondary: &str) -> SnapshotFrame {
        let server = Server {
            id: ServerId::new(uuid::Uuid::nil()),
            upstream_id: "up".into(),
            code: "en1".into(),
            region: Region::Europe,
            language: None,
            tags: vec![],
            online: true,
            scenery: "default".into(),
            utc_offset_seconds: 0,
            registered_at: Utc::now(),
            deleted: false,
        };
        SnapshotFrame {
            id: FrameId {
                primary: primary.to_string(),
                server_id: None,
                secondary: secondary.to_string(),
            },
            base_timestamp: Utc::now(),
            payload: SnapshotPayload::Server(Box::new(server)),
        }
    }

    #[test]
    fn set_then_find_by_both_keys() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.set(frame("p1", "s1"));
        assert!(cache.find_by_primary("p1").is_some());
        assert!(cache.find_by_secondary("s1").is_some());
    }

    #[test]
    fn expired_entries_are_absent() {
        let cache = SnapshotCache::new(Duration::from_millis(0));
        cache.set(frame("p1", "s1"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.find_by_primary("p1").is_none());
    }

    #[test]
    fn find_by_secondary_not_in_detects_disappearance() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.set(frame("p1", "s1"));
        cache.set(frame("p2", "s2"));
        let known: std::collections::HashSet<String> = ["s1".to_string()].into_iter().collect();
        let missing = cache.find_by_secondary_not_in(&known);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].primary_key(), "p2");
    }

    #[test]
    fn remove_by_primary_drops_secondary_index() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.set(frame("p1", "s1"));
        cache.remove_by_primary("p1");
        assert!(cache.find_by_secondary("s1").is_none());
    }
}
