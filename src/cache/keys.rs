//! Type-safe cache key builders

use std::fmt;
use uuid::Uuid;

pub const VERSION: &str = "v1";

pub mod idempotency {
    use super::*;

    pub const NAMESPACE: &str = "idempotency";

    /// Idempotency cache key, scoped by merchant so two tenants reusing the
    /// same client key can never collide.
    #[derive(Debug, Clone)]
    pub struct RequestKey {
        pub merchant_id: Uuid,
        pub client_key: String,
    }

    impl RequestKey {
        pub fn new(merchant_id: Uuid, client_key: impl Into<String>) -> Self {
            Self {
                merchant_id,
                client_key: client_key.into(),
            }
        }
    }

    impl fmt::Display for RequestKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:{}:{}",
                VERSION, NAMESPACE, self.merchant_id, self.client_key
            )
        }
    }
}

pub mod provider {
    use super::*;

    pub const NAMESPACE: &str = "provider";

    /// OAuth access-token key, one per provider.
    #[derive(Debug, Clone)]
    pub struct TokenKey {
        pub provider: String,
    }

    impl TokenKey {
        pub fn new(provider: impl Into<String>) -> Self {
            Self {
                provider: provider.into(),
            }
        }
    }

    impl fmt::Display for TokenKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{}:token:{}", VERSION, NAMESPACE, self.provider)
        }
    }
}

pub mod queue {
    use super::*;

    pub const NAMESPACE: &str = "queue";

    #[derive(Debug, Clone, Copy)]
    pub enum Segment {
        Ready,
        Delayed,
        Processing,
    }

    impl Segment {
        fn as_str(&self) -> &'static str {
            match self {
                Segment::Ready => "ready",
                Segment::Delayed => "delayed",
                Segment::Processing => "processing",
            }
        }
    }

    /// Key for one segment of a named queue.
    #[derive(Debug, Clone)]
    pub struct QueueKey {
        pub name: String,
        pub segment: Segment,
    }

    impl QueueKey {
        pub fn new(name: impl Into<String>, segment: Segment) -> Self {
            Self {
                name: name.into(),
                segment,
            }
        }
    }

    impl fmt::Display for QueueKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}:{}:{}:{}",
                VERSION,
                NAMESPACE,
                self.name,
                self.segment.as_str()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_key_is_merchant_scoped() {
        let merchant = Uuid::nil();
        let key = idempotency::RequestKey::new(merchant, "abc123");
        assert_eq!(
            key.to_string(),
            "v1:idempotency:00000000-0000-0000-0000-000000000000:abc123"
        );
    }

    #[test]
    fn test_provider_token_key() {
        let key = provider::TokenKey::new("moncash");
        assert_eq!(key.to_string(), "v1:provider:token:moncash");
    }

    #[test]
    fn test_queue_key_segments() {
        let key = queue::QueueKey::new("payments.moncash", queue::Segment::Delayed);
        assert_eq!(key.to_string(), "v1:queue:payments.moncash:delayed");
    }
}
