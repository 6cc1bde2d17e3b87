use bigdecimal::BigDecimal;
use chrono::Utc;
use std::str::FromStr;
use uuid::Uuid;

use dhecash_gateway::database::payment_repository::Payment;
use dhecash_gateway::providers::http::verify_hmac_sha256_hex;
use dhecash_gateway::queue::{
    backoff_delay_ms, PAYMENT_JOB_OPTIONS, WEBHOOK_JOB_OPTIONS,
};
use dhecash_gateway::services::webhook_dispatcher::{events, WebhookDispatcher};

fn completed_payment() -> Payment {
    Payment {
        id: 42,
        reference: "pay_scenario3ref000000000".to_string(),
        merchant_id: Uuid::nil(),
        channel: "moncash".to_string(),
        status: "completed".to_string(),
        amount: BigDecimal::from_str("100.00").unwrap(),
        currency: "HTG".to_string(),
        fee_rate: BigDecimal::from_str("0.025").unwrap(),
        fee_amount: BigDecimal::from_str("2.50").unwrap(),
        net_amount: BigDecimal::from_str("97.50").unwrap(),
        refunded_amount: BigDecimal::from(0),
        provider_transaction_id: Some("ABC".to_string()),
        redirect_url: None,
        idempotency_key: None,
        customer_email: Some("buyer@example.com".to_string()),
        customer_phone: None,
        customer_name: None,
        customer_id: None,
        order_id: Some("O1".to_string()),
        metadata: None,
        failure_reason: None,
        expires_at: Utc::now(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        completed_at: Some(Utc::now()),
        failed_at: None,
    }
}

#[test]
fn envelope_matches_notification_contract() {
    let payment = completed_payment();
    let envelope = WebhookDispatcher::build_envelope(&payment, events::PAYMENT_SUCCEEDED);

    assert_eq!(envelope["api_version"], "1.0");
    assert_eq!(envelope["event_type"], "payment.succeeded");
    assert!(envelope["created_at"].is_string());

    let data = &envelope["data"];
    assert_eq!(data["payment_ref"], payment.reference);
    assert_eq!(data["order_id"], "O1");
    assert_eq!(data["channel"], "moncash");
    assert_eq!(data["status"], "completed");
    // Amounts are JSON numbers in the outbound envelope.
    assert_eq!(data["amount"], 100.0);
    assert_eq!(data["currency"], "HTG");
    assert_eq!(data["fee_amount"], 2.5);
    assert_eq!(data["net_amount"], 97.5);
    assert_eq!(data["provider_transaction_id"], "ABC");
    assert!(data["failed_at"].is_null());
    assert!(data["failure_reason"].is_null());
}

#[test]
fn signature_header_verifies_over_timestamp_dot_payload() {
    let payload = r#"{"api_version":"1.0","event_type":"payment.succeeded"}"#;
    let header = WebhookDispatcher::signature_header(1712000000, payload, "endpoint-secret");

    let (t, v1) = header.split_once(",v1=").unwrap();
    let timestamp = t.strip_prefix("t=").unwrap();
    assert_eq!(timestamp, "1712000000");

    let signed = format!("{}.{}", timestamp, payload);
    assert!(verify_hmac_sha256_hex(
        signed.as_bytes(),
        "endpoint-secret",
        v1
    ));
    // A receiver recomputing over a tampered payload must not match.
    let tampered = format!("{}.{}", timestamp, r#"{"event_type":"payment.failed"}"#);
    assert!(!verify_hmac_sha256_hex(
        tampered.as_bytes(),
        "endpoint-secret",
        v1
    ));
}

#[test]
fn webhook_retry_schedule_spans_required_window() {
    // 5 attempts with base 5s: 5/10/20/40/80 — cumulative 155s.
    let delays: Vec<u64> = (1..=WEBHOOK_JOB_OPTIONS.max_attempts)
        .map(|attempt| backoff_delay_ms(WEBHOOK_JOB_OPTIONS.backoff_base_ms, attempt))
        .collect();
    assert_eq!(delays, vec![5_000, 10_000, 20_000, 40_000, 80_000]);
    assert_eq!(delays.iter().sum::<u64>(), 155_000);
}

#[test]
fn payment_retry_schedule() {
    let delays: Vec<u64> = (1..=PAYMENT_JOB_OPTIONS.max_attempts)
        .map(|attempt| backoff_delay_ms(PAYMENT_JOB_OPTIONS.backoff_base_ms, attempt))
        .collect();
    assert_eq!(delays, vec![2_000, 4_000, 8_000]);
}

#[test]
fn event_names_are_stable() {
    assert_eq!(events::PAYMENT_SUCCEEDED, "payment.succeeded");
    assert_eq!(events::PAYMENT_FAILED, "payment.failed");
    assert_eq!(events::PAYMENT_CANCELLED, "payment.cancelled");
    assert_eq!(events::PAYMENT_REFUNDED, "payment.refunded");
}
