//! Thin typed wrapper over the Redis pool.

use bb8::PooledConnection;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{CacheError, RedisPool};

/// Shared handle on the Redis pool with the small command surface the
/// gateway needs: string get/set with TTL for caches, list and sorted-set
/// primitives for the job queue.
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
}

impl RedisStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }

    pub async fn get_connection(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        conn.get(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_string(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn set_json_ex<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), CacheError> {
        let raw =
            serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.set_ex(key, &raw, ttl_secs).await
    }

    // List / sorted-set primitives for the job queue.

    pub async fn list_push(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .lpush(key, value)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    /// RPOPLPUSH: atomically move the oldest element of `src` to `dst`.
    pub async fn list_move_tail(&self, src: &str, dst: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        conn.rpoplpush(src, dst)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    /// LREM: remove one occurrence of `value` from `key`.
    pub async fn list_remove(&self, key: &str, value: &str) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        conn.lrem(key, 1, value)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    pub async fn list_len(&self, key: &str) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        conn.llen(key)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))
    }

    pub async fn zset_add(&self, key: &str, member: &str, score: f64) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn
            .zadd(key, member, score)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;
        Ok(())
    }

    /// Pop up to `limit` members whose score is `<= max_score`.
    ///
    /// The range-then-remove pair is not atomic; a member that survives a
    /// crashed worker is simply promoted again, which at-least-once delivery
    /// tolerates.
    pub async fn zset_pop_due(
        &self,
        key: &str,
        max_score: f64,
        limit: isize,
    ) -> Result<Vec<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let due: Vec<String> = conn
            .zrangebyscore_limit(key, "-inf", max_score, 0, limit)
            .await
            .map_err(|e| CacheError::Command(e.to_string()))?;

        for member in &due {
            let _: () = conn
                .zrem(key, member)
                .await
                .map_err(|e| CacheError::Command(e.to_string()))?;
        }

        Ok(due)
    }
}
