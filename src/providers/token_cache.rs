//! OAuth2 client-credentials token cache.
//!
//! Tokens are held in Redis with TTL `expires_in - 60s` so a token is never
//! handed out within a minute of its expiry. Concurrent misses may each mint
//! a token; the last writer wins and tokens are interchangeable.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::keys;
use crate::cache::RedisStore;
use crate::providers::error::{ProviderError, ProviderResult};
use crate::providers::http::{Auth, ProviderHttpClient};

/// Token fetches use a tighter timeout than regular provider calls.
const TOKEN_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Refresh margin subtracted from the provider-reported lifetime.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// One provider's client-credentials grant.
#[derive(Debug, Clone)]
pub struct OauthClient {
    pub provider: &'static str,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

impl OauthClient {
    async fn mint(&self) -> ProviderResult<TokenResponse> {
        let http = ProviderHttpClient::new(self.provider, TOKEN_FETCH_TIMEOUT)?;

        let mut params: Vec<(&str, String)> =
            vec![("grant_type", "client_credentials".to_string())];
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.clone()));
        }

        http.post_form(
            &self.token_url,
            Auth::Basic {
                user: &self.client_id,
                password: &self.client_secret,
            },
            &params,
        )
        .await
    }
}

/// Redis-backed read-through cache for provider access tokens.
#[derive(Clone)]
pub struct TokenCache {
    store: RedisStore,
}

impl TokenCache {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }

    pub async fn access_token(&self, oauth: &OauthClient) -> ProviderResult<String> {
        let key = keys::provider::TokenKey::new(oauth.provider).to_string();

        match self.store.get_string(&key).await {
            Ok(Some(token)) => {
                debug!(provider = oauth.provider, "provider token cache hit");
                return Ok(token);
            }
            Ok(None) => {}
            Err(e) => {
                // A cache outage must not block payments; fall through to mint.
                warn!(provider = oauth.provider, error = %e, "token cache read failed");
            }
        }

        let minted = oauth.mint().await.map_err(|e| match e {
            ProviderError::Remote {
                provider, message, ..
            } => ProviderError::Unavailable {
                provider,
                message: format!("token endpoint rejected credentials: {}", message),
            },
            other => other,
        })?;

        let ttl = minted.expires_in.saturating_sub(EXPIRY_MARGIN_SECS);
        if ttl > 0 {
            if let Err(e) = self.store.set_ex(&key, &minted.access_token, ttl).await {
                warn!(provider = oauth.provider, error = %e, "token cache write failed");
            }
        }

        Ok(minted.access_token)
    }

    pub async fn invalidate(&self, provider: &str) -> ProviderResult<()> {
        let key = keys::provider::TokenKey::new(provider).to_string();
        self.store.delete(&key).await.map_err(|e| {
            ProviderError::Unavailable {
                provider: provider.to_string(),
                message: format!("failed to invalidate token: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_defaults_expiry() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok_abc"}"#).unwrap();
        assert_eq!(parsed.access_token, "tok_abc");
        assert_eq!(parsed.expires_in, 3600);
    }

    #[test]
    fn token_response_reads_expiry() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"tok_abc","expires_in":59,"token_type":"bearer"}"#)
                .unwrap();
        assert_eq!(parsed.expires_in, 59);
        // Anything at or under the margin is not worth caching.
        assert_eq!(parsed.expires_in.saturating_sub(EXPIRY_MARGIN_SECS), 0);
    }
}
