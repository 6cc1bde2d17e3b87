//! Per-channel fee schedule.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::providers::types::Channel;

/// Fee rates snapshotted onto each payment at creation.
pub fn fee_rate(channel: Channel) -> BigDecimal {
    let rate = match channel {
        Channel::Moncash => "0.025",
        Channel::Natcash => "0.025",
        Channel::Stripe => "0.035",
    };
    BigDecimal::from_str(rate).expect("fee table rates are valid decimals")
}

/// `round(amount × rate, 2)`, half-up.
pub fn fee_amount(amount: &BigDecimal, rate: &BigDecimal) -> BigDecimal {
    (amount * rate).with_scale_round(2, bigdecimal::RoundingMode::HalfUp)
}

pub fn net_amount(amount: &BigDecimal, fee: &BigDecimal) -> BigDecimal {
    amount - fee
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn moncash_fee_on_one_hundred() {
        let rate = fee_rate(Channel::Moncash);
        let fee = fee_amount(&dec("100.00"), &rate);
        assert_eq!(fee, dec("2.50"));
        assert_eq!(net_amount(&dec("100.00"), &fee), dec("97.50"));
    }

    #[test]
    fn stripe_rate_is_higher() {
        let rate = fee_rate(Channel::Stripe);
        let fee = fee_amount(&dec("200.00"), &rate);
        assert_eq!(fee, dec("7.00"));
    }

    #[test]
    fn fee_rounds_half_up_to_cents() {
        // 33.33 * 0.025 = 0.83325 → 0.83
        let fee = fee_amount(&dec("33.33"), &fee_rate(Channel::Moncash));
        assert_eq!(fee, dec("0.83"));
        // 33.50 * 0.025 = 0.8375 → 0.84
        let fee = fee_amount(&dec("33.50"), &fee_rate(Channel::Natcash));
        assert_eq!(fee, dec("0.84"));
    }

    #[test]
    fn invariant_fee_plus_net_equals_gross() {
        for raw in ["100.00", "33.33", "0.01", "99999.99"] {
            let amount = dec(raw);
            let fee = fee_amount(&amount, &fee_rate(Channel::Stripe));
            let net = net_amount(&amount, &fee);
            assert_eq!(&fee + &net, amount);
        }
    }
}
