//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::error;

use crate::cache::RedisStore;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Up,
    Down,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

/// Health checker over the gateway's two stateful dependencies.
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: sqlx::PgPool,
    store: RedisStore,
}

impl HealthChecker {
    pub fn new(db_pool: sqlx::PgPool, store: RedisStore) -> Self {
        Self { db_pool, store }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;

        match timeout(Duration::from_secs(5), check_database(&self.db_pool)).await {
            Ok(Ok(response_time)) => {
                health_status
                    .checks
                    .insert("database".to_string(), ComponentHealth::up(Some(response_time)));
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert("database".to_string(), ComponentHealth::down(Some(e)));
                error!("database health check failed");
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some("timeout".to_string())),
                );
                error!("database health check timed out");
            }
        }

        match timeout(Duration::from_secs(5), check_cache(&self.store)).await {
            Ok(Ok(response_time)) => {
                health_status
                    .checks
                    .insert("cache".to_string(), ComponentHealth::up(Some(response_time)));
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status
                    .checks
                    .insert("cache".to_string(), ComponentHealth::down(Some(e)));
                error!("cache health check failed");
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "cache".to_string(),
                    ComponentHealth::down(Some("timeout".to_string())),
                );
                error!("cache health check timed out");
            }
        }

        health_status.status = if overall_healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };

        health_status
    }
}

async fn check_database(pool: &sqlx::PgPool) -> Result<u128, String> {
    let start = Instant::now();
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => Ok(start.elapsed().as_millis()),
        Err(e) => Err(e.to_string()),
    }
}

async fn check_cache(store: &RedisStore) -> Result<u128, String> {
    let start = Instant::now();
    match store.get_connection().await {
        Ok(mut conn) => {
            let result: redis::RedisResult<String> =
                redis::cmd("PING").query_async(&mut *conn).await;
            match result {
                Ok(_) => Ok(start.elapsed().as_millis()),
                Err(e) => Err(e.to_string()),
            }
        }
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_creation() {
        let health_status = HealthStatus::new();
        assert!(health_status.is_healthy());
        assert!(health_status.checks.is_empty());
    }

    #[test]
    fn test_component_health_states() {
        let up = ComponentHealth::up(Some(100));
        assert!(matches!(up.status, ComponentState::Up));
        assert_eq!(up.response_time_ms, Some(100));

        let down = ComponentHealth::down(Some("connection refused".to_string()));
        assert!(matches!(down.status, ComponentState::Down));
        assert_eq!(down.details, Some("connection refused".to_string()));
    }
}
