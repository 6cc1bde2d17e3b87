//! Replay-safe caching of create-payment responses.
//!
//! A request carrying an `Idempotency-Key` header returns the cached
//! response verbatim when the same merchant retries within the TTL. This is
//! a request-level guarantee; callback deduplication is the state machine's
//! job. Cache outages degrade to executing the request (a rare duplicate
//! beats a failed create).

use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use crate::cache::keys;
use crate::cache::RedisStore;

pub const IDEMPOTENCY_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct IdempotencyStore {
    store: RedisStore,
}

impl IdempotencyStore {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, merchant_id: Uuid, client_key: &str) -> Option<JsonValue> {
        let key = keys::idempotency::RequestKey::new(merchant_id, client_key).to_string();
        match self.store.get_json(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "idempotency cache read failed");
                None
            }
        }
    }

    pub async fn put(&self, merchant_id: Uuid, client_key: &str, response: &JsonValue) {
        let key = keys::idempotency::RequestKey::new(merchant_id, client_key).to_string();
        if let Err(e) = self
            .store
            .set_json_ex(&key, response, IDEMPOTENCY_TTL_SECS)
            .await
        {
            warn!(error = %e, "idempotency cache write failed");
        }
    }
}
