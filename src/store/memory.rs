//! In-memory store backend for single-process operation.
//!
//! Lock-based and ephemeral; every test runs against this backend. TTL'd
//! keys are expired lazily on access.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::{StoreError, TtlStore};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

#[derive(Default)]
struct Shared {
    keys: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<String>>,
}

impl Shared {
    /// Drop the entry if it has expired; true when a live entry remains.
    fn key_live(&mut self, key: &str) -> bool {
        match self.keys.get(key) {
            Some(entry) if entry.live() => true,
            Some(_) => {
                self.keys.remove(key);
                false
            }
            None => false,
        }
    }

    fn pop_to(&mut self, src: &str, dst: &str) -> Option<String> {
        let value = self.lists.get_mut(src)?.pop_back()?;
        self.lists
            .entry(dst.to_string())
            .or_default()
            .push_front(value.clone());
        Some(value)
    }
}

/// In-memory store backend.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Mutex<Shared>>,
    notify: Arc<Notify>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TtlStore for InMemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut shared = self.shared.lock().await;
        shared.keys.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut shared = self.shared.lock().await;
        if shared.key_live(key) {
            return Ok(false);
        }
        shared.keys.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut shared = self.shared.lock().await;
        Ok(shared.key_live(key))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut shared = self.shared.lock().await;
        if !shared.key_live(key) {
            return Ok(None);
        }
        Ok(shared.keys.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut shared = self.shared.lock().await;
        let was_live = shared.key_live(key);
        shared.keys.remove(key);
        Ok(was_live)
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut shared = self.shared.lock().await;
            shared
                .lists
                .entry(list.to_string())
                .or_default()
                .push_front(value.to_string());
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn pop_to(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError> {
        let mut shared = self.shared.lock().await;
        Ok(shared.pop_to(src, dst))
    }

    async fn pop_to_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(value) = self.pop_to(src, dst).await? {
                return Ok(Some(value));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // A push between the pop attempt and this await leaves a stored
            // permit on the Notify, so the wakeup is not lost.
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    async fn remove(&self, list: &str, value: &str) -> Result<u64, StoreError> {
        let mut shared = self.shared.lock().await;
        let Some(items) = shared.lists.get_mut(list) else {
            return Ok(0);
        };
        let before = items.len();
        items.retain(|v| v != value);
        Ok((before - items.len()) as u64)
    }

    async fn requeue_if_present(
        &self,
        src: &str,
        dst: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let moved = {
            let mut shared = self.shared.lock().await;
            let removed = match shared.lists.get_mut(src) {
                Some(items) => {
                    let before = items.len();
                    items.retain(|v| v != value);
                    before - items.len()
                }
                None => 0,
            };
            if removed > 0 {
                shared
                    .lists
                    .entry(dst.to_string())
                    .or_default()
                    .push_front(value.to_string());
            }
            removed > 0
        };
        if moved {
            self.notify.notify_one();
        }
        Ok(moved)
    }

    async fn list_len(&self, list: &str) -> Result<u64, StoreError> {
        let shared = self.shared.lock().await;
        Ok(shared.lists.get(list).map_or(0, |l| l.len()) as u64)
    }

    async fn list_items(&self, list: &str) -> Result<Vec<String>, StoreError> {
        let shared = self.shared.lock().await;
        Ok(shared
            .lists
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_nx_claims_once() {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_nx_ex("k", "a", ttl).await.unwrap());
        assert!(!store.set_nx_ex("k", "b", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn keys_expire() {
        let store = InMemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        assert!(store.exists("k").await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.exists("k").await.unwrap());
        // Expired key is claimable again
        assert!(store
            .set_nx_ex("k", "v2", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn lists_are_fifo_through_pop_to() {
        let store = InMemoryStore::new();
        store.push("main", "first").await.unwrap();
        store.push("main", "second").await.unwrap();

        assert_eq!(
            store.pop_to("main", "work").await.unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            store.pop_to("main", "work").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(store.pop_to("main", "work").await.unwrap(), None);
        assert_eq!(store.list_len("work").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn blocking_pop_times_out_empty() {
        let store = InMemoryStore::new();
        let got = store
            .pop_to_blocking("main", "work", Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn blocking_pop_wakes_on_push() {
        let store = InMemoryStore::new();
        let pusher = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            pusher.push("main", "late").await.unwrap();
        });

        let got = store
            .pop_to_blocking("main", "work", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn requeue_if_present_moves_once() {
        let store = InMemoryStore::new();
        store.push("work", "item").await.unwrap();

        assert!(store
            .requeue_if_present("work", "main", "item")
            .await
            .unwrap());
        assert_eq!(store.list_len("work").await.unwrap(), 0);
        assert_eq!(store.list_len("main").await.unwrap(), 1);

        // Already moved: nothing left to requeue, no duplicate appears.
        assert!(!store
            .requeue_if_present("work", "main", "item")
            .await
            .unwrap());
        assert_eq!(store.list_len("main").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_counts_occurrences() {
        let store = InMemoryStore::new();
        store.push("l", "x").await.unwrap();
        store.push("l", "y").await.unwrap();
        store.push("l", "x").await.unwrap();

        assert_eq!(store.remove("l", "x").await.unwrap(), 2);
        assert_eq!(store.remove("l", "x").await.unwrap(), 0);
        assert_eq!(store.list_len("l").await.unwrap(), 1);
    }
}
