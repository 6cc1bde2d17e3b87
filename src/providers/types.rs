use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

use crate::providers::error::ProviderError;

/// Supported payment processors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Moncash,
    Natcash,
    Stripe,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Moncash => "moncash",
            Channel::Natcash => "natcash",
            Channel::Stripe => "stripe",
        }
    }

    pub fn all() -> [Channel; 3] {
        [Channel::Moncash, Channel::Natcash, Channel::Stripe]
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "moncash" => Ok(Channel::Moncash),
            "natcash" => Ok(Channel::Natcash),
            "stripe" => Ok(Channel::Stripe),
            _ => Err(ProviderError::Validation {
                message: format!("unsupported channel: {}", value),
                field: Some("channel".to_string()),
            }),
        }
    }
}

/// Internal create-payment request handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub order_id: Option<String>,
    pub payment_reference: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub description: Option<String>,
}

/// Adapter response to a create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    /// The processor's own handle for this payment, used to correlate
    /// callbacks.
    pub provider_transaction_id: String,
    pub redirect_url: Option<String>,
    pub provider_reference: Option<String>,
}

/// Provider-side payment status, normalized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusResponse {
    pub status: ProviderPaymentStatus,
    pub payer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRefundResponse {
    pub refund_id: String,
    pub status: ProviderPaymentStatus,
}

/// Normalized outcome carried by an authenticated provider callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackKind {
    Completed,
    Failed { reason: Option<String> },
    Cancelled,
    Refunded { amount: Option<BigDecimal> },
}

/// An authenticated inbound provider notification.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub channel: Channel,
    pub event_type: String,
    pub provider_transaction_id: String,
    pub kind: CallbackKind,
    pub payload: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parsing_accepts_known_values() {
        assert_eq!(Channel::from_str("moncash").unwrap(), Channel::Moncash);
        assert_eq!(Channel::from_str(" Stripe ").unwrap(), Channel::Stripe);
        assert!(Channel::from_str("paypal").is_err());
    }

    #[test]
    fn channel_serializes_snake_case() {
        let json = serde_json::to_string(&Channel::Natcash).unwrap();
        assert_eq!(json, "\"natcash\"");
    }
}
