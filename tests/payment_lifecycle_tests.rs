use bigdecimal::BigDecimal;
use std::str::FromStr;

use dhecash_gateway::database::payment_repository::PaymentStatus;
use dhecash_gateway::providers::types::Channel;
use dhecash_gateway::refs;
use dhecash_gateway::services::fees;
use dhecash_gateway::services::payment_service::{decode_cursor, encode_cursor};

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

#[test]
fn create_scenario_amounts() {
    // 100.00 HTG on moncash: fee 2.50, net 97.50.
    let amount = dec("100.00");
    let rate = fees::fee_rate(Channel::Moncash);
    let fee = fees::fee_amount(&amount, &rate);
    let net = fees::net_amount(&amount, &fee);

    assert_eq!(fee, dec("2.50"));
    assert_eq!(net, dec("97.50"));
    assert_eq!(&fee + &net, amount);
}

#[test]
fn payment_reference_shape() {
    let reference = refs::payment_ref();
    let payload = reference.strip_prefix("pay_").expect("pay_ prefix");
    assert_eq!(payload.len(), 21);
    assert!(payload.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[test]
fn lifecycle_happy_path_is_legal() {
    let path = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::PartiallyRefunded,
        PaymentStatus::Refunded,
    ];
    for pair in path.windows(2) {
        assert!(
            pair[0].can_transition_to(&pair[1]),
            "{:?} -> {:?} should be legal",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn no_reverse_transitions() {
    let all = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Expired,
        PaymentStatus::PartiallyRefunded,
        PaymentStatus::Refunded,
    ];
    // Terminal failure states admit no further transitions.
    for terminal in [
        PaymentStatus::Failed,
        PaymentStatus::Cancelled,
        PaymentStatus::Expired,
        PaymentStatus::Refunded,
    ] {
        for next in all {
            assert!(
                !terminal.can_transition_to(&next),
                "{:?} -> {:?} should be illegal",
                terminal,
                next
            );
        }
    }
    // Completed never moves backwards.
    assert!(!PaymentStatus::Completed.can_transition_to(&PaymentStatus::Processing));
    assert!(!PaymentStatus::Completed.can_transition_to(&PaymentStatus::Pending));
}

#[test]
fn refund_accounting_flips_status_at_full_amount() {
    // Scenario: 100.00 gross, refund 40.00 then 60.00.
    let gross = dec("100.00");
    let mut refunded = dec("0");

    refunded += dec("40.00");
    assert!(refunded < gross); // partially_refunded

    refunded += dec("60.00");
    assert_eq!(refunded, gross); // refunded

    // A further 0.01 would exceed the gross.
    let outstanding = &gross - &refunded;
    assert!(dec("0.01") > outstanding);
}

#[test]
fn cursor_is_opaque_and_reversible() {
    let cursor = encode_cursor(123456);
    assert_ne!(cursor, "123456");
    assert_eq!(decode_cursor(&cursor), Some(123456));
    assert_eq!(decode_cursor("not-base64!"), None);
}

#[test]
fn settled_states_match_credit_invariant() {
    // A credit row exists iff status is completed / partially_refunded /
    // refunded.
    assert!(PaymentStatus::Completed.is_settled());
    assert!(PaymentStatus::PartiallyRefunded.is_settled());
    assert!(PaymentStatus::Refunded.is_settled());
    assert!(!PaymentStatus::Pending.is_settled());
    assert!(!PaymentStatus::Processing.is_settled());
    assert!(!PaymentStatus::Failed.is_settled());
    assert!(!PaymentStatus::Expired.is_settled());
}
