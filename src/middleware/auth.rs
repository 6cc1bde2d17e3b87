//! Authentication trust boundary.
//!
//! Inbound requests authenticate with either a secret API key
//! (`Authorization: Bearer sk_...`, resolved against the merchants table) or
//! a JWT issued for dashboard sessions. Both resolve to the owning merchant;
//! every repository read and write downstream is scoped by that identity.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::database::merchant_repository::MerchantRepository;
use crate::error::{AppError, AppErrorKind, AuthError};

/// The authenticated merchant principal.
#[derive(Debug, Clone)]
pub struct MerchantAuth {
    pub merchant_id: Uuid,
    pub environment: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Issue a dashboard JWT for a merchant.
pub fn issue_token(
    merchant_id: Uuid,
    secret: &str,
    expiry_hours: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: merchant_id.to_string(),
        exp: (now + Duration::hours(expiry_hours)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::new(AppErrorKind::Auth(AuthError::TokenInvalid)))
}

/// Decode and validate a dashboard JWT, returning the merchant id.
pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        let kind = match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::TokenInvalid,
        };
        AppError::new(AppErrorKind::Auth(kind))
    })?;

    Uuid::parse_str(&data.claims.sub)
        .map_err(|_| AppError::new(AppErrorKind::Auth(AuthError::TokenInvalid)))
}

fn bearer_token(parts: &Parts) -> Result<String, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::new(AppErrorKind::Auth(AuthError::MissingCredentials)))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::new(AppErrorKind::Auth(AuthError::MissingCredentials)))?;

    if token.trim().is_empty() {
        return Err(AppError::new(AppErrorKind::Auth(
            AuthError::MissingCredentials,
        )));
    }

    Ok(token.to_string())
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for MerchantAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let repo = MerchantRepository::new(state.pool.clone());

        // Secret API keys are self-describing; everything else is a JWT.
        if token.starts_with("sk_") {
            let merchant = repo
                .find_by_api_secret(&token)
                .await?
                .ok_or_else(|| AppError::new(AppErrorKind::Auth(AuthError::ApiKeyInvalid)))?;

            return Ok(MerchantAuth {
                merchant_id: merchant.id,
                environment: merchant.environment,
            });
        }

        let merchant_id = verify_token(&token, &state.auth.jwt_secret)?;
        let merchant = repo
            .find_active_by_id(merchant_id)
            .await?
            .ok_or_else(|| AppError::new(AppErrorKind::Auth(AuthError::InvalidCredentials)))?;

        Ok(MerchantAuth {
            merchant_id: merchant.id,
            environment: merchant.environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips() {
        let merchant_id = Uuid::new_v4();
        let secret = "test_jwt_secret_0123456789";

        let token = issue_token(merchant_id, secret, 24).unwrap();
        let verified = verify_token(&token, secret).unwrap();
        assert_eq!(verified, merchant_id);
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let merchant_id = Uuid::new_v4();
        let token = issue_token(merchant_id, "secret-a-0123456789", 24).unwrap();
        let err = verify_token(&token, "secret-b-0123456789").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn expired_jwt_maps_to_token_expired() {
        let merchant_id = Uuid::new_v4();
        let secret = "test_jwt_secret_0123456789";
        let token = issue_token(merchant_id, secret, -1).unwrap();

        let err = verify_token(&token, secret).unwrap_err();
        assert_eq!(err.error_code(), crate::error::ErrorCode::TokenExpired);
    }
}
