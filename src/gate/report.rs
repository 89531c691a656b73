//! Usage Report
//!
//! Read-only snapshot of one user's rate limit state and the shared service
//! quotas, for an admin or status view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::QuotaStatus;
use crate::rate_limit::RateLimitStatus;

/// Usage report for a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    /// Timestamp of report generation
    pub generated_at: DateTime<Utc>,

    /// User the report was built for
    pub user_id: String,

    /// Status of every action type for the user
    pub rate_limits: Vec<RateLimitStatus>,

    /// Status of every known service quota
    pub quotas: Vec<QuotaStatus>,

    /// Summary statistics
    pub summary: UsageSummary,
}

/// Aggregates over a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Actions the user can no longer perform in the open window
    pub actions_at_limit: Vec<String>,

    /// Services whose monthly quota is used up
    pub services_exhausted: Vec<String>,

    /// Estimated upstream spend of the user's open windows in USD
    pub estimated_spend_usd: f64,

    /// Average utilization across the user's action limits
    pub avg_utilization_percent: f64,
}

impl UsageReport {
    /// Build a report and its summary from raw statuses
    pub fn build(
        generated_at: DateTime<Utc>,
        user_id: &str,
        rate_limits: Vec<RateLimitStatus>,
        quotas: Vec<QuotaStatus>,
    ) -> Self {
        let summary = summarize(&rate_limits, &quotas);
        Self {
            generated_at,
            user_id: user_id.to_string(),
            rate_limits,
            quotas,
            summary,
        }
    }
}

fn summarize(rate_limits: &[RateLimitStatus], quotas: &[QuotaStatus]) -> UsageSummary {
    let mut estimated_spend_usd = 0.0;
    let mut total_utilization = 0.0;
    let mut counted = 0usize;

    for status in rate_limits {
        estimated_spend_usd += status.used as f64 * status.estimated_cost_usd;
        if status.limit > 0 {
            total_utilization += status.used as f64 / status.limit as f64 * 100.0;
            counted += 1;
        }
    }

    UsageSummary {
        actions_at_limit: rate_limits
            .iter()
            .filter(|s| s.used >= s.limit)
            .map(|s| s.action.to_string())
            .collect(),
        services_exhausted: quotas
            .iter()
            .filter(|q| !q.available)
            .map(|q| q.service.clone())
            .collect(),
        estimated_spend_usd,
        avg_utilization_percent: if counted > 0 {
            total_utilization / counted as f64
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{ActionType, WindowScheme};
    use chrono::TimeZone;

    fn rate(action: ActionType, used: u32, limit: u32) -> RateLimitStatus {
        let policy = action.policy();
        RateLimitStatus {
            user_id: "u1".to_string(),
            action,
            window: policy.window,
            allowed: used < limit,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            reset_at: Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap(),
            graceful_fallback: policy.graceful_fallback,
            estimated_cost_usd: policy.cost_per_call_usd,
        }
    }

    fn quota(service: &str, used: u64, limit: u64) -> QuotaStatus {
        QuotaStatus {
            service: service.to_string(),
            available: used < limit,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            reset_date: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
            days_until_reset: 17,
        }
    }

    #[test]
    fn test_summary() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap();
        let report = UsageReport::build(
            now,
            "u1",
            vec![
                rate(ActionType::LiveSearch, 10, 10),
                rate(ActionType::ChatMessage, 15, 30),
            ],
            vec![quota("fireplexity", 50, 50), quota("travel_buddy", 3, 120)],
        );

        assert_eq!(report.user_id, "u1");
        assert_eq!(report.rate_limits[0].window, WindowScheme::Daily);
        assert_eq!(report.summary.actions_at_limit, vec!["live_search".to_string()]);
        assert_eq!(report.summary.services_exhausted, vec!["fireplexity".to_string()]);
        assert!((report.summary.estimated_spend_usd - (10.0 * 0.005 + 15.0 * 0.002)).abs() < 1e-9);
        assert!((report.summary.avg_utilization_percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap();
        let report = UsageReport::build(now, "nobody", Vec::new(), Vec::new());
        assert!(report.summary.actions_at_limit.is_empty());
        assert_eq!(report.summary.avg_utilization_percent, 0.0);
    }
}
