//! Backing TTL key-value store: the single source of truth for queue and
//! dedup state.
//!
//! The trait is a thin adapter over a Redis-style store: TTL'd keys with
//! atomic set-if-absent, plus lists with an atomic tail-to-head move.
//! Two backends:
//! - In-memory (single process; tests and local smoke runs)
//! - Redis (distributed, the deployment backend)

mod memory;

#[cfg(feature = "redis-backend")]
mod redis;

pub use memory::InMemoryStore;

#[cfg(feature = "redis-backend")]
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

/// Errors from backing store operations.
///
/// A failed call leaves store state unchanged; callers retry the whole
/// operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Thin adapter over the shared key-value store.
///
/// Every method is a single atomic operation against the backend; nothing
/// here reads-then-writes across two RPCs. `requeue_if_present` exists so
/// the expiry sweep can move an item without racing a concurrent complete.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Set `key` with a TTL, overwriting any live value.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Set `key` with a TTL only if no live value exists. Returns true when
    /// this call created the key.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete `key`; true when a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Push a value onto the head of `list`.
    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError>;

    /// Atomically pop the tail of `src` and push it onto the head of `dst`.
    async fn pop_to(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError>;

    /// Like [`pop_to`](Self::pop_to), but waits up to `timeout` for a value
    /// to arrive.
    async fn pop_to_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Remove all occurrences of `value` from `list`; returns how many were
    /// removed.
    async fn remove(&self, list: &str, value: &str) -> Result<u64, StoreError>;

    /// Atomically remove `value` from `src` and, only when it was still
    /// present, push it onto `dst`. Returns true when the move happened.
    async fn requeue_if_present(
        &self,
        src: &str,
        dst: &str,
        value: &str,
    ) -> Result<bool, StoreError>;

    async fn list_len(&self, list: &str) -> Result<u64, StoreError>;

    async fn list_items(&self, list: &str) -> Result<Vec<String>, StoreError>;
}
