//! Rate Limiter
//!
//! Reports per-user usage against each action's window and records calls.
//! The limiter never refuses to record: callers check first, run the
//! action, and increment only when the action actually went ahead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::action::ActionType;
use super::config::RateLimitConfig;
use super::window::{effective_count, WindowScheme};
use crate::clock::Clock;
use crate::metrics;
use crate::store::{DocumentStore, RateLimitKey, RateLimitRecord, StoreResult};

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// User the check was made for
    pub user_id: String,

    /// Action checked
    pub action: ActionType,

    /// Window scheme of the action
    pub window: WindowScheme,

    /// Whether another call is allowed now
    pub allowed: bool,

    /// Calls already made in the open window
    pub used: u32,

    /// Calls allowed per window
    pub limit: u32,

    /// Calls left in the open window
    pub remaining: u32,

    /// When the open window closes (or would close if opened now)
    pub reset_at: DateTime<Utc>,

    /// Whether the feature may fall back to cached/static data
    pub graceful_fallback: bool,

    /// Estimated upstream cost of the next call in USD
    pub estimated_cost_usd: f64,
}

impl RateLimitStatus {
    /// Reset time as a clock string, e.g. "14:05 UTC"
    pub fn reset_time_display(&self) -> String {
        self.reset_at.format("%H:%M UTC").to_string()
    }

    /// User-facing message when the action is denied
    pub fn denial_message(&self) -> Option<String> {
        if self.allowed {
            return None;
        }

        let mut message = format!(
            "You've reached your {} limit of {} for {}. It resets at {}.",
            self.window.as_str(),
            self.limit,
            self.action.label(),
            self.reset_time_display()
        );
        if self.graceful_fallback {
            message.push_str(" Showing cached or general information instead.");
        }
        Some(message)
    }
}

/// Per-user, per-action fixed-window rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter<S> {
    /// Backing store
    store: S,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Configuration
    config: RateLimitConfig,
}

impl<S: DocumentStore> RateLimiter<S> {
    /// Create a new rate limiter
    pub fn new(store: S, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Report usage for `action` without changing any state
    pub async fn check(&self, user_id: &str, action: ActionType) -> StoreResult<RateLimitStatus> {
        let now = self.clock.now();
        let policy = self.config.policy_for(action);
        let key = RateLimitKey::new(user_id, action);
        let record = self.store.rate_limit_record(&key).await?;

        let (used, reset_at) = match &record {
            Some(r) if r.window.is_current(r.window_start, now) => {
                (effective_count(r, now), r.window.reset_at(r.window_start))
            }
            _ => (0, policy.window.reset_at(policy.window.start_for(now))),
        };

        let allowed = !self.config.enabled || used < policy.limit;
        metrics::RATE_LIMIT_CHECKS_TOTAL
            .with_label_values(&[action.as_str(), metrics::result_label(allowed)])
            .inc();

        debug!(
            user_id,
            action = action.as_str(),
            used,
            limit = policy.limit,
            allowed,
            "Rate limit check"
        );

        Ok(RateLimitStatus {
            user_id: user_id.to_string(),
            action,
            window: policy.window,
            allowed,
            used,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(used),
            reset_at,
            graceful_fallback: policy.graceful_fallback,
            estimated_cost_usd: policy.cost_per_call_usd,
        })
    }

    /// Record one call, opening a new window if the stored one has closed
    pub async fn increment(&self, user_id: &str, action: ActionType) -> StoreResult<RateLimitRecord> {
        let now = self.clock.now();
        let policy = self.config.policy_for(action);
        let key = RateLimitKey::new(user_id, action);

        let record = match self.store.rate_limit_record(&key).await? {
            Some(existing) if existing.window.is_current(existing.window_start, now) => {
                RateLimitRecord {
                    count: existing.count.saturating_add(1),
                    ..existing
                }
            }
            existing => RateLimitRecord {
                id: existing.map(|r| r.id).unwrap_or_else(Uuid::new_v4),
                user_id: user_id.to_string(),
                action,
                window: policy.window,
                window_start: policy.window.start_for(now),
                count: 1,
            },
        };

        debug!(
            user_id,
            action = action.as_str(),
            count = record.count,
            "Recorded rate-limited call"
        );
        self.store.put_rate_limit_record(record.clone()).await?;
        Ok(record)
    }

    /// Delete a user's counters for one action, or all actions when `action` is `None`
    ///
    /// Returns the number of records removed.
    pub async fn reset_for_user(
        &self,
        user_id: &str,
        action: Option<ActionType>,
    ) -> StoreResult<usize> {
        let keys: Vec<RateLimitKey> = match action {
            Some(action) => vec![RateLimitKey::new(user_id, action)],
            None => self
                .store
                .rate_limit_records_for_user(user_id)
                .await?
                .iter()
                .map(RateLimitRecord::key)
                .collect(),
        };

        let mut removed = 0;
        for key in &keys {
            if self.store.delete_rate_limit_record(key).await? {
                removed += 1;
            }
        }

        info!(
            user_id,
            action = action.map(|a| a.as_str()).unwrap_or("all"),
            removed,
            "Reset user rate limits"
        );
        Ok(removed)
    }

    /// Status of every action type for a user
    pub async fn check_all(&self, user_id: &str) -> StoreResult<Vec<RateLimitStatus>> {
        let mut statuses = Vec::with_capacity(ActionType::ALL.len());
        for action in ActionType::ALL {
            statuses.push(self.check(user_id, action).await?);
        }
        Ok(statuses)
    }
}
