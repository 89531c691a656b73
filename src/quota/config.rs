//! Quota Configuration
//!
//! Monthly call limits for shared external services.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default monthly limit for services without an explicit entry
pub const DEFAULT_MONTHLY_LIMIT: u64 = 100;

/// Metrics label for services without a configured limit
pub const OTHER_SERVICE_LABEL: &str = "other";

/// Service quota configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Limit for services not listed in `services`
    pub default_monthly_limit: u64,

    /// Monthly limit per service name
    pub services: BTreeMap<String, u64>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        let services = [
            ("fireplexity", 50),
            ("perplexity", 100),
            ("travel_buddy", 120),
        ]
        .into_iter()
        .map(|(name, limit)| (name.to_string(), limit))
        .collect();

        Self {
            default_monthly_limit: DEFAULT_MONTHLY_LIMIT,
            services,
        }
    }
}

impl QuotaConfig {
    /// Monthly limit for a service
    pub fn limit_for(&self, service: &str) -> u64 {
        self.services
            .get(service)
            .copied()
            .unwrap_or(self.default_monthly_limit)
    }

    /// Set the limit for one service
    pub fn with_service(mut self, service: &str, limit: u64) -> Self {
        self.services.insert(service.to_string(), limit);
        self
    }

    /// Metrics label for a service; unconfigured names share `"other"`
    pub fn metrics_label<'a>(&'a self, service: &'a str) -> &'a str {
        if self.services.contains_key(service) {
            service
        } else {
            OTHER_SERVICE_LABEL
        }
    }

    /// Validate limits
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.default_monthly_limit == 0 {
            anyhow::bail!("Default monthly quota must be > 0");
        }
        for (service, limit) in &self.services {
            if service.trim().is_empty() {
                anyhow::bail!("Quota service names must not be empty");
            }
            if *limit == 0 {
                anyhow::bail!("Monthly quota for '{}' must be > 0", service);
            }
        }
        Ok(())
    }
}
