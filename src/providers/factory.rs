use crate::cache::RedisStore;
use crate::config::{AppConfig, MoncashConfig, NatcashConfig, StripeConfig};
use crate::providers::error::ProviderResult;
use crate::providers::moncash::MoncashProvider;
use crate::providers::natcash::NatcashProvider;
use crate::providers::provider::PaymentProvider;
use crate::providers::stripe::StripeProvider;
use crate::providers::token_cache::TokenCache;
use crate::providers::types::Channel;

/// Builds the adapter for a payment's channel.
///
/// Adapters are cheap to construct (configuration plus an HTTP client), so
/// the factory builds one per call rather than holding live instances.
pub struct ProviderFactory {
    moncash: MoncashConfig,
    natcash: NatcashConfig,
    stripe: StripeConfig,
    tokens: TokenCache,
}

impl ProviderFactory {
    pub fn new(config: &AppConfig, store: RedisStore) -> Self {
        Self {
            moncash: config.moncash.clone(),
            natcash: config.natcash.clone(),
            stripe: config.stripe.clone(),
            tokens: TokenCache::new(store),
        }
    }

    pub fn get_provider(&self, channel: Channel) -> ProviderResult<Box<dyn PaymentProvider>> {
        match channel {
            Channel::Moncash => Ok(Box::new(MoncashProvider::new(
                self.moncash.clone(),
                self.tokens.clone(),
            )?)),
            Channel::Natcash => Ok(Box::new(NatcashProvider::new(
                self.natcash.clone(),
                self.tokens.clone(),
            )?)),
            Channel::Stripe => Ok(Box::new(StripeProvider::new(self.stripe.clone())?)),
        }
    }
}
