use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

use crate::providers::error::{ProviderError, ProviderResult};

/// Authentication schemes understood by the provider HTTP client.
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Basic { user: &'a str, password: &'a str },
}

/// Shared HTTP egress client for provider adapters.
///
/// Every call carries the configured timeout; a reqwest timeout maps to
/// `ProviderError::Timeout`, any other transport failure to a retryable
/// `Remote` error.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    provider: &'static str,
    timeout: Duration,
}

impl ProviderHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Unavailable {
                provider: provider.to_string(),
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            provider,
            timeout,
        })
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: Auth<'_>,
        body: &JsonValue,
    ) -> ProviderResult<T> {
        let request = self.apply_auth(self.client.post(url), auth).json(body);
        self.execute(request).await
    }

    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: Auth<'_>,
        params: &[(&str, String)],
    ) -> ProviderResult<T> {
        let request = self.apply_auth(self.client.post(url), auth).form(params);
        self.execute(request).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, auth: Auth<'_>) -> ProviderResult<T> {
        let request = self.apply_auth(self.client.get(url), auth);
        self.execute(request).await
    }

    fn apply_auth(
        &self,
        request: reqwest::RequestBuilder,
        auth: Auth<'_>,
    ) -> reqwest::RequestBuilder {
        match auth {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    provider: self.provider.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                ProviderError::Remote {
                    provider: self.provider.to_string(),
                    message: format!("request failed: {}", e),
                    provider_code: None,
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                provider = self.provider,
                status = %status,
                "provider request returned error status"
            );
            return Err(ProviderError::Remote {
                provider: self.provider.to_string(),
                message: format!("HTTP {}: {}", status, text),
                provider_code: Some(status.as_u16().to_string()),
            });
        }

        serde_json::from_str::<T>(&text).map_err(|e| ProviderError::Remote {
            provider: self.provider.to_string(),
            message: format!("invalid provider JSON response: {}", e),
            provider_code: None,
        })
    }
}

pub fn hmac_sha256_hex(payload: &[u8], secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    let computed = hmac_sha256_hex(payload, secret);
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn hmac_sha256_round_trip() {
        let payload = br#"{"event":"payment.succeeded"}"#;
        let signature = hmac_sha256_hex(payload, "secret");
        assert!(verify_hmac_sha256_hex(payload, "secret", &signature));
        assert!(!verify_hmac_sha256_hex(payload, "secret", "deadbeef"));
        assert!(!verify_hmac_sha256_hex(payload, "other-secret", &signature));
    }
}
