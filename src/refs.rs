//! Prefixed opaque references returned to clients in place of internal ids.

use rand::{distributions::Alphanumeric, Rng};

/// Alphanumeric payload length for regular references (~125 bits of entropy).
const REF_LEN: usize = 21;
/// Longer payload for API secrets.
const SECRET_LEN: usize = 32;

fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn payment_ref() -> String {
    format!("pay_{}", random_token(REF_LEN))
}

pub fn transaction_ref() -> String {
    format!("txn_{}", random_token(REF_LEN))
}

pub fn payout_ref() -> String {
    format!("po_{}", random_token(REF_LEN))
}

pub fn invoice_ref() -> String {
    format!("inv_{}", random_token(REF_LEN))
}

/// Publishable API key, e.g. `pk_test_...` / `pk_live_...`.
pub fn public_key(environment: &str) -> String {
    format!("pk_{}_{}", environment, random_token(REF_LEN))
}

/// Secret API key, e.g. `sk_test_...` / `sk_live_...`.
pub fn secret_key(environment: &str) -> String {
    format!("sk_{}_{}", environment, random_token(SECRET_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_ref_matches_expected_shape() {
        let reference = payment_ref();
        assert!(reference.starts_with("pay_"));
        let payload = &reference["pay_".len()..];
        assert_eq!(payload.len(), 21);
        assert!(payload.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn references_are_unique() {
        let a = transaction_ref();
        let b = transaction_ref();
        assert_ne!(a, b);
    }

    #[test]
    fn secret_keys_carry_environment_and_long_payload() {
        let key = secret_key("test");
        assert!(key.starts_with("sk_test_"));
        assert_eq!(key.len(), "sk_test_".len() + 32);
    }
}
