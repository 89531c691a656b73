//! Cache Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a cached value holds; selects its default time-to-live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTtl {
    /// Currency exchange rates
    ExchangeRate,
    /// Corridor cost-of-living baselines
    Corridor,
    /// Memoised translations
    Translation,
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL for exchange rates in seconds
    pub exchange_rate_ttl_secs: u64,

    /// TTL for corridor baselines in seconds
    pub corridor_ttl_secs: u64,

    /// TTL for translations in seconds
    pub translation_ttl_secs: u64,

    /// Interval between expiry sweeps when running as a daemon
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            exchange_rate_ttl_secs: 3600,
            corridor_ttl_secs: 24 * 3600,
            translation_ttl_secs: 30 * 24 * 3600,
            sweep_interval_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// Time-to-live for a kind of cached value
    pub fn ttl_for(&self, kind: CacheTtl) -> Duration {
        let secs = match kind {
            CacheTtl::ExchangeRate => self.exchange_rate_ttl_secs,
            CacheTtl::Corridor => self.corridor_ttl_secs,
            CacheTtl::Translation => self.translation_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// Interval between sweeps
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate TTLs and sweep interval
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exchange_rate_ttl_secs == 0
            || self.corridor_ttl_secs == 0
            || self.translation_ttl_secs == 0
        {
            anyhow::bail!("Cache TTLs must be > 0");
        }
        if self.sweep_interval_secs < 60 {
            anyhow::bail!("Cache sweep interval must be at least 60 seconds");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for(CacheTtl::ExchangeRate), Duration::from_secs(3600));
        assert_eq!(config.ttl_for(CacheTtl::Corridor), Duration::from_secs(86_400));
        assert_eq!(config.ttl_for(CacheTtl::Translation), Duration::from_secs(2_592_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = CacheConfig {
            corridor_ttl_secs: 0,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_sweep_interval() {
        let config = CacheConfig {
            sweep_interval_secs: 30,
            ..CacheConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
