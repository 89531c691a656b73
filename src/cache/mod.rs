//! Expiring Cache Module
//!
//! Caches exchange rates, corridor baselines and translations in the
//! document store. Expired entries stay readable (flagged) until
//! [`ExpiringCache::sweep_expired`] removes them.

pub mod config;
pub mod error;
pub mod expiring;
pub mod keys;

pub use config::{CacheConfig, CacheTtl};
pub use error::CacheError;
pub use expiring::{sweep_snapshot, CachedValue, ExpiringCache};
pub use keys::{corridor_key, exchange_rate_key, translation_key};
