use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Merchant account row. One row per (merchant, environment); the API keys
/// carry the environment in their prefix (`sk_test_`, `sk_live_`).
#[derive(Debug, Clone, FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub api_key: String,
    pub api_secret: String,
    pub environment: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

const MERCHANT_COLUMNS: &str =
    "id, name, email, api_key, api_secret, environment, status, created_at";

pub struct MerchantRepository {
    pool: PgPool,
}

impl MerchantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Merchant>, DatabaseError> {
        let sql = format!("SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1");
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Lookup for the API-key trust boundary; only active merchants
    /// authenticate.
    pub async fn find_by_api_secret(
        &self,
        api_secret: &str,
    ) -> Result<Option<Merchant>, DatabaseError> {
        let sql = format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants \
             WHERE api_secret = $1 AND status = 'active'"
        );
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(api_secret)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<Merchant>, DatabaseError> {
        let sql = format!(
            "SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1 AND status = 'active'"
        );
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
