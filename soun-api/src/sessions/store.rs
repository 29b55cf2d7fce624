//! Bounded, idle-expiring in-memory session store
//!
//! Sessions are keyed by UUID. Each access refreshes the entry's idle timer.
//! Inserting into a full store evicts the least recently touched entry, and
//! `sweep_expired` drops everything idle past the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct Entry<T> {
    value: T,
    last_touched: Instant,
}

pub struct SessionStore<T> {
    entries: RwLock<HashMap<Uuid, Entry<T>>>,
    capacity: usize,
    ttl: Duration,
}

impl<T> SessionStore<T> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Insert a session, returning the id of an evicted session if the store was full
    pub async fn insert(&self, id: Uuid, value: T) -> Option<Uuid> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let mut evicted = None;

        if !entries.contains_key(&id) && entries.len() >= self.capacity {
            let victim = entries
                .iter()
                .min_by_key(|(_, e)| e.last_touched)
                .map(|(k, _)| *k);

            if let Some(victim) = victim {
                entries.remove(&victim);
                tracing::debug!(session_id = %victim, "Evicted least recently used session");
                evicted = Some(victim);
            }
        }

        entries.insert(
            id,
            Entry {
                value,
                last_touched: now,
            },
        );

        evicted
    }

    /// Mutate a live session in place, refreshing its idle timer
    ///
    /// Returns `None` when the session is missing or expired.
    pub async fn update<R>(&self, id: &Uuid, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let expired = match entries.get(id) {
            Some(entry) => now.duration_since(entry.last_touched) > self.ttl,
            None => return None,
        };

        if expired {
            entries.remove(id);
            return None;
        }

        let entry = entries.get_mut(id)?;
        entry.last_touched = now;
        Some(f(&mut entry.value))
    }

    pub async fn remove(&self, id: &Uuid) -> Option<T> {
        self.entries.write().await.remove(id).map(|e| e.value)
    }

    /// Drop sessions idle past the TTL, returning how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.last_touched) <= self.ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Clone> SessionStore<T> {
    /// Clone of a live session, refreshing its idle timer
    pub async fn get(&self, id: &Uuid) -> Option<T> {
        self.update(id, |value| value.clone()).await
    }
}

impl<T: Send + Sync + 'static> SessionStore<T> {
    /// Periodically sweep expired sessions until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = self.sweep_expired().await;
                if removed > 0 {
                    tracing::info!(removed, "Swept expired sessions");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_get_update_remove() {
        let store = SessionStore::new(10, Duration::from_secs(60));
        let id = Uuid::new_v4();

        assert_eq!(store.insert(id, 1u32).await, None);
        assert_eq!(store.get(&id).await, Some(1));

        let doubled = store.update(&id, |v| {
            *v *= 2;
            *v
        })
        .await;
        assert_eq!(doubled, Some(2));

        assert_eq!(store.remove(&id).await, Some(2));
        assert_eq!(store.get(&id).await, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_touched() {
        let store = SessionStore::new(2, Duration::from_secs(60));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        store.insert(first, "a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.insert(second, "b").await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // Touch `first` so `second` becomes the oldest
        assert_eq!(store.get(&first).await, Some("a"));
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.insert(third, "c").await, Some(second));
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(&second).await, None);
        assert_eq!(store.get(&first).await, Some("a"));
    }

    #[tokio::test]
    async fn test_reinsert_existing_id_does_not_evict() {
        let store = SessionStore::new(1, Duration::from_secs(60));
        let id = Uuid::new_v4();

        store.insert(id, 1).await;
        assert_eq!(store.insert(id, 2).await, None);
        assert_eq!(store.get(&id).await, Some(2));
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_swept() {
        let store = SessionStore::new(10, Duration::from_millis(20));
        let stale = Uuid::new_v4();
        let also_stale = Uuid::new_v4();

        store.insert(stale, 1).await;
        store.insert(also_stale, 2).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get(&stale).await, None);
        assert_eq!(store.sweep_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweeper_task_removes_expired() {
        let store = Arc::new(SessionStore::new(10, Duration::from_millis(10)));
        store.insert(Uuid::new_v4(), ()).await;

        let handle = store.clone().spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(store.is_empty().await);
    }
}
