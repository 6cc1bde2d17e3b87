use axum::http::HeaderMap;
use base64::{engine::general_purpose, Engine as _};
use bigdecimal::BigDecimal;
use std::str::FromStr;

use dhecash_gateway::config::{MoncashConfig, StripeConfig};
use dhecash_gateway::providers::error::ProviderError;
use dhecash_gateway::providers::http::hmac_sha256_hex;
use dhecash_gateway::providers::moncash::MoncashProvider;
use dhecash_gateway::providers::natcash::NatcashProvider;
use dhecash_gateway::providers::provider::PaymentProvider;
use dhecash_gateway::providers::stripe::StripeProvider;
use dhecash_gateway::providers::token_cache::TokenCache;
use dhecash_gateway::providers::types::{CallbackKind, ProviderPaymentStatus};

fn detached_store() -> dhecash_gateway::cache::RedisStore {
    let manager = bb8_redis::RedisConnectionManager::new("redis://127.0.0.1:6379")
        .expect("valid redis url");
    let pool = bb8::Pool::builder()
        .max_size(1)
        .connection_timeout(std::time::Duration::from_millis(10))
        .build_unchecked(manager);
    dhecash_gateway::cache::RedisStore::new(pool)
}

fn moncash() -> MoncashProvider {
    MoncashProvider::new(
        MoncashConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            api_base_url: "https://sandbox.moncashbutton.digicelgroup.com".to_string(),
            gateway_base_url: "https://sandbox.moncashbutton.digicelgroup.com".to_string(),
        },
        TokenCache::new(detached_store()),
    )
    .unwrap()
}

fn stripe() -> StripeProvider {
    StripeProvider::new(StripeConfig {
        secret_key: Some("sk_test_123".to_string()),
        webhook_secret: Some("whsec_test".to_string()),
        base_url: "https://api.stripe.com".to_string(),
    })
    .unwrap()
}

fn stripe_headers(body: &[u8], secret: &str, timestamp: &str) -> HeaderMap {
    let mut signed = Vec::new();
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(body);
    let signature = hmac_sha256_hex(&signed, secret);

    let mut headers = HeaderMap::new();
    headers.insert(
        "stripe-signature",
        format!("t={},v1={}", timestamp, signature).parse().unwrap(),
    );
    headers
}

#[test]
fn moncash_usd_payment_converts_at_140() {
    // Persisted amount stays USD; only the outbound provider amount is HTG.
    let usd = BigDecimal::from_str("100.00").unwrap();
    let htg = MoncashProvider::amount_in_htg(&usd, "USD");
    assert_eq!(htg, BigDecimal::from_str("14000.00").unwrap());

    let htg_input = BigDecimal::from_str("500.00").unwrap();
    assert_eq!(MoncashProvider::amount_in_htg(&htg_input, "HTG"), htg_input);
}

#[test]
fn moncash_payment_token_decodes_id_and_ref() {
    let claims = serde_json::json!({"id": "ABC", "ref": "REF1"});
    let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
    let payload = general_purpose::URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let token = format!("{}.{}.sig", header, payload);

    let decoded = MoncashProvider::decode_payment_token(&token).unwrap();
    assert_eq!(decoded.id, "ABC");
    assert_eq!(decoded.reference.as_deref(), Some("REF1"));
}

#[tokio::test]
async fn moncash_callback_missing_transaction_id_is_rejected() {
    let provider = moncash();
    let err = provider
        .verify_callback(br#"{"orderId":"O1","amount":100}"#, &HeaderMap::new())
        .unwrap_err();
    assert!(matches!(err, ProviderError::Verification { .. }));
}

#[tokio::test]
async fn moncash_callback_success_path() {
    let provider = moncash();
    let event = provider
        .verify_callback(
            br#"{"transactionId":"ABC","orderId":"O1","amount":100}"#,
            &HeaderMap::new(),
        )
        .unwrap();
    assert_eq!(event.provider_transaction_id, "ABC");
    assert_eq!(event.kind, CallbackKind::Completed);
}

#[test]
fn natcash_status_enum_mapping() {
    assert_eq!(
        NatcashProvider::map_status("SUCCESS"),
        ProviderPaymentStatus::Completed
    );
    assert_eq!(
        NatcashProvider::map_status("PENDING"),
        ProviderPaymentStatus::Pending
    );
    assert_eq!(
        NatcashProvider::map_status("FAILED"),
        ProviderPaymentStatus::Failed
    );
    assert_eq!(
        NatcashProvider::map_status("CANCELLED"),
        ProviderPaymentStatus::Failed
    );
}

#[test]
fn stripe_minor_units() {
    assert_eq!(
        StripeProvider::to_minor_units(&BigDecimal::from_str("100.00").unwrap()),
        10000
    );
    assert_eq!(
        StripeProvider::to_minor_units(&BigDecimal::from_str("0.50").unwrap()),
        50
    );
}

#[test]
fn stripe_valid_signature_accepts_event() {
    let provider = stripe();
    let body = serde_json::json!({
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_X"}}
    })
    .to_string();
    let headers = stripe_headers(body.as_bytes(), "whsec_test", "1712000000");

    let event = provider.verify_callback(body.as_bytes(), &headers).unwrap();
    assert_eq!(event.provider_transaction_id, "pi_X");
    assert_eq!(event.kind, CallbackKind::Completed);
}

#[test]
fn stripe_tampered_signature_is_rejected_before_any_state() {
    let provider = stripe();
    let body = serde_json::json!({
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_X"}}
    })
    .to_string();
    // Signed with the wrong secret.
    let headers = stripe_headers(body.as_bytes(), "whsec_wrong", "1712000000");

    let err = provider
        .verify_callback(body.as_bytes(), &headers)
        .unwrap_err();
    assert!(matches!(err, ProviderError::Verification { .. }));
}

#[test]
fn stripe_payment_failed_extracts_decline_reason() {
    let provider = stripe();
    let body = serde_json::json!({
        "type": "payment_intent.payment_failed",
        "data": {"object": {
            "id": "pi_X",
            "last_payment_error": {"message": "card_declined"}
        }}
    })
    .to_string();
    let headers = stripe_headers(body.as_bytes(), "whsec_test", "1712000000");

    let event = provider.verify_callback(body.as_bytes(), &headers).unwrap();
    assert_eq!(
        event.kind,
        CallbackKind::Failed {
            reason: Some("card_declined".to_string())
        }
    );
}

#[test]
fn stripe_charge_refunded_divides_cents() {
    let provider = stripe();
    let body = serde_json::json!({
        "type": "charge.refunded",
        "data": {"object": {
            "id": "ch_1",
            "payment_intent": "pi_X",
            "amount_refunded": 12345
        }}
    })
    .to_string();
    let headers = stripe_headers(body.as_bytes(), "whsec_test", "1712000000");

    let event = provider.verify_callback(body.as_bytes(), &headers).unwrap();
    match event.kind {
        CallbackKind::Refunded { amount } => {
            assert_eq!(amount.unwrap(), BigDecimal::from_str("123.45").unwrap());
        }
        other => panic!("unexpected kind: {:?}", other),
    }
}
