//! Redis-backed key/value layer
//!
//! Holds the ephemeral state of the gateway: idempotency records, provider
//! OAuth tokens, and the job-queue structures. Gracefully degrades when the
//! initial connection test fails so a Redis blip does not block startup.

pub mod error;
pub mod keys;
pub mod store;

use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{error, info, warn};

pub use error::CacheError;
pub use store::RedisStore;

/// Redis connection pool type alias
pub type RedisPool = Pool<RedisConnectionManager>;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct CachePoolConfig {
    pub redis_url: String,
    pub max_connections: u32,
    pub min_idle: u32,
    pub connection_timeout: Duration,
}

impl Default for CachePoolConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 20,
            min_idle: 5,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

/// Initialize the Redis connection pool
pub async fn init_cache_pool(config: CachePoolConfig) -> Result<RedisPool, CacheError> {
    info!(
        max_connections = config.max_connections,
        "Initializing Redis pool"
    );

    // Validate the URL eagerly; the manager connects lazily.
    Client::open(config.redis_url.clone()).map_err(|e| {
        error!("Invalid Redis URL: {}", e);
        CacheError::Connection(e.to_string())
    })?;

    let manager = RedisConnectionManager::new(config.redis_url.clone())
        .map_err(|e| CacheError::Connection(e.to_string()))?;

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(config.min_idle)
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .await
        .map_err(|e| {
            error!("Failed to build Redis connection pool: {}", e);
            CacheError::Connection(e.to_string())
        })?;

    if let Err(e) = test_connection(&pool).await {
        warn!("Initial Redis connection test failed, continuing: {}", e);
    }

    info!("Redis pool initialized");
    Ok(pool)
}

async fn test_connection(pool: &RedisPool) -> Result<(), CacheError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| CacheError::Connection(e.to_string()))?;

    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| CacheError::Command(e.to_string()))?;

    Ok(())
}

/// Health check for the Redis pool
pub async fn health_check(pool: &RedisPool) -> Result<(), CacheError> {
    test_connection(pool).await
}
