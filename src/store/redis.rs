//! Redis store backend for distributed operation.
//!
//! One multiplexed connection manager shared by clones; the multi-step
//! requeue goes through Lua so it stays atomic on the server.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{StoreError, TtlStore};

/// LREM + conditional LPUSH in one server-side step: requeue an in-flight
/// item only while it is still present, so a concurrently completed item is
/// never resurrected.
const REQUEUE_IF_PRESENT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 0, ARGV[1])
if removed > 0 then
  redis.call('LPUSH', KEYS[2], ARGV[1])
end
return removed
"#;

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and return a store handle. Fails fast when the server is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_io_error() || e.is_timeout() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

/// Redis EX takes whole seconds; never send 0, which is a protocol error.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl TtlStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn push(&self, list: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(list, value).await?;
        Ok(())
    }

    async fn pop_to(&self, src: &str, dst: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("RPOPLPUSH")
            .arg(src)
            .arg(dst)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn pop_to_blocking(
        &self,
        src: &str,
        dst: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        if timeout.is_zero() {
            // BRPOPLPUSH treats 0 as "block forever"; checkout timeouts are
            // always bounded.
            return self.pop_to(src, dst).await;
        }
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(src)
            .arg(dst)
            .arg(timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn remove(&self, list: &str, value: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.lrem(list, 0, value).await?;
        Ok(removed as u64)
    }

    async fn requeue_if_present(
        &self,
        src: &str,
        dst: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::Script::new(REQUEUE_IF_PRESENT)
            .key(src)
            .key(dst)
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn list_len(&self, list: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let len: i64 = conn.llen(list).await?;
        Ok(len as u64)
    }

    async fn list_items(&self, list: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(list, 0, -1).await?)
    }
}
