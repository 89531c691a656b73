//! Rate Limit Configuration
//!
//! Per-action limit overrides on top of the static [`ActionType::policy`]
//! table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::action::{ActionPolicy, ActionType};

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting; when false every check is allowed but usage is still recorded
    pub enabled: bool,

    /// Limit overrides keyed by snake_case action name
    pub limits: HashMap<String, u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limits: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable rate limiting (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Override the limit for one action
    pub fn with_limit(mut self, action: ActionType, limit: u32) -> Self {
        self.limits.insert(action.as_str().to_string(), limit);
        self
    }

    /// Effective policy for an action, overrides applied
    pub fn policy_for(&self, action: ActionType) -> ActionPolicy {
        let mut policy = action.policy();
        if let Some(limit) = self.limits.get(action.as_str()) {
            policy.limit = *limit;
        }
        policy
    }

    /// Validate override names and values
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, limit) in &self.limits {
            name.parse::<ActionType>()?;
            if *limit == 0 {
                anyhow::bail!("Rate limit for '{}' must be > 0", name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert!(config.limits.is_empty());
        assert_eq!(
            config.policy_for(ActionType::LiveSearch),
            ActionType::LiveSearch.policy()
        );
    }

    #[test]
    fn test_disabled_config() {
        let config = RateLimitConfig::disabled();
        assert!(!config.enabled);
    }

    #[test]
    fn test_override_only_changes_limit() {
        let config = RateLimitConfig::new().with_limit(ActionType::LiveSearch, 3);
        let policy = config.policy_for(ActionType::LiveSearch);
        assert_eq!(policy.limit, 3);
        assert_eq!(policy.window, ActionType::LiveSearch.policy().window);
        assert!(policy.graceful_fallback);
    }

    #[test]
    fn test_validate_rejects_unknown_action() {
        let mut config = RateLimitConfig::default();
        config.limits.insert("warp_drive".to_string(), 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = RateLimitConfig::default().with_limit(ActionType::Translation, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = RateLimitConfig::default().with_limit(ActionType::ChatMessage, 50);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RateLimitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
