pub mod error;
pub mod factory;
pub mod http;
pub mod moncash;
pub mod natcash;
pub mod provider;
pub mod stripe;
pub mod token_cache;
pub mod types;
