//! Quota Tracker
//!
//! Shared monthly call counters for paid external APIs. A record from a
//! previous month reads as unused; it is overwritten on the next increment.
//! `check` and `increment` are separate so a caller can check, attempt the
//! external call, and count it only if it succeeded.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::QuotaConfig;
use crate::clock::Clock;
use crate::metrics;
use crate::store::{DocumentStore, QuotaRecord, StoreResult};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Result of a quota check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    /// Service checked
    pub service: String,

    /// Whether another call fits in this month's quota
    pub available: bool,

    /// Calls made this month
    pub used: u64,

    /// Monthly limit
    pub limit: u64,

    /// Calls left this month
    pub remaining: u64,

    /// First instant of next month
    pub reset_date: DateTime<Utc>,

    /// Whole days until `reset_date`, rounded up
    pub days_until_reset: i64,
}

impl QuotaStatus {
    /// User-facing message when the quota is used up
    pub fn denial_message(&self) -> Option<String> {
        if self.available {
            return None;
        }

        Some(format!(
            "The monthly quota for {} is used up ({}/{} calls). It resets on {} (in {} day{}).",
            self.service,
            self.used,
            self.limit,
            self.reset_date.format("%B %-d, %Y"),
            self.days_until_reset,
            if self.days_until_reset == 1 { "" } else { "s" }
        ))
    }
}

/// First instant (00:00:00 UTC on day 1) of the month after `now`
pub fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("day 1 at midnight is always a valid UTC instant")
}

/// Days from `now` until `reset_date`, rounded up
pub fn days_until(reset_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (reset_date - now).num_seconds() as f64;
    (seconds / SECONDS_PER_DAY).ceil() as i64
}

/// Whether the record belongs to a month that has already ended
pub fn is_rolled_over(record: &QuotaRecord, now: DateTime<Utc>) -> bool {
    now >= record.reset_date
}

/// Calls counted against the current month
pub fn effective_call_count(record: &QuotaRecord, now: DateTime<Utc>) -> u64 {
    if is_rolled_over(record, now) {
        0
    } else {
        record.call_count
    }
}

/// Per-service monthly quota tracker
#[derive(Debug, Clone)]
pub struct QuotaTracker<S> {
    /// Backing store
    store: S,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Configuration
    config: QuotaConfig,
}

impl<S: DocumentStore> QuotaTracker<S> {
    /// Create a new quota tracker
    pub fn new(store: S, clock: Arc<dyn Clock>, config: QuotaConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// Report this month's usage for a service without changing any state
    pub async fn check(&self, service: &str) -> StoreResult<QuotaStatus> {
        let now = self.clock.now();
        let limit = self.config.limit_for(service);
        let record = self.store.quota_record(service).await?;

        let (used, reset_date) = match &record {
            Some(r) if !is_rolled_over(r, now) => (r.call_count, r.reset_date),
            _ => (0, next_month_start(now)),
        };

        let available = used < limit;
        metrics::QUOTA_CHECKS_TOTAL
            .with_label_values(&[
                self.config.metrics_label(service),
                metrics::result_label(available),
            ])
            .inc();
        debug!(service, used, limit, available, "Quota check");

        Ok(QuotaStatus {
            service: service.to_string(),
            available,
            used,
            limit,
            remaining: limit.saturating_sub(used),
            reset_date,
            days_until_reset: days_until(reset_date, now),
        })
    }

    /// Record one call to `service`
    ///
    /// Not gated by [`check`](Self::check); callers decide whether to call.
    pub async fn increment(&self, service: &str, endpoint: &str) -> StoreResult<QuotaRecord> {
        let now = self.clock.now();

        let record = match self.store.quota_record(service).await? {
            Some(existing) if !is_rolled_over(&existing, now) => QuotaRecord {
                endpoint: endpoint.to_string(),
                call_count: existing.call_count.saturating_add(1),
                last_call_at: now,
                ..existing
            },
            existing => {
                if existing.is_some() {
                    info!(service, "Monthly quota rolled over");
                }
                QuotaRecord {
                    id: existing.map(|r| r.id).unwrap_or_else(Uuid::new_v4),
                    service: service.to_string(),
                    endpoint: endpoint.to_string(),
                    call_count: 1,
                    reset_date: next_month_start(now),
                    last_call_at: now,
                }
            }
        };

        metrics::QUOTA_INCREMENTS_TOTAL
            .with_label_values(&[self.config.metrics_label(service)])
            .inc();
        debug!(
            service,
            endpoint,
            call_count = record.call_count,
            "Recorded service call"
        );
        self.store.put_quota_record(record.clone()).await?;
        Ok(record)
    }

    /// Status of every configured service plus any service with a stored record
    pub async fn check_all(&self) -> StoreResult<Vec<QuotaStatus>> {
        let mut services: Vec<String> = self.config.services.keys().cloned().collect();
        for record in self.store.quota_records().await? {
            if !services.contains(&record.service) {
                services.push(record.service);
            }
        }
        services.sort();

        let mut statuses = Vec::with_capacity(services.len());
        for service in &services {
            statuses.push(self.check(service).await?);
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::Duration;
    use proptest::prelude::*;

    fn june(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn tracker(now: DateTime<Utc>) -> (QuotaTracker<MemoryStore>, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::new(now);
        let tracker = QuotaTracker::new(store.clone(), Arc::new(clock.clone()), QuotaConfig::default());
        (tracker, store, clock)
    }

    #[test]
    fn test_next_month_start() {
        assert_eq!(
            next_month_start(june(15, 10)),
            Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            next_month_start(Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap()),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
        // Already on the boundary: the next one is a month later
        assert_eq!(
            next_month_start(Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap()),
            Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_days_until_rounds_up() {
        let reset = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(days_until(reset, june(30, 23)), 1);
        assert_eq!(days_until(reset, june(30, 0)), 1);
        assert_eq!(days_until(reset, june(29, 23)), 2);
        assert_eq!(days_until(reset, june(1, 0)), 30);
    }

    #[tokio::test]
    async fn test_unconfigured_service_counted_under_other_label() {
        let (tracker, _, _) = tracker(june(10, 9));
        let unique = "ad-hoc-service-7f3a";
        let before = metrics::QUOTA_INCREMENTS_TOTAL
            .with_label_values(&["other"])
            .get();

        tracker.increment(unique, "/x").await.unwrap();

        assert!(
            metrics::QUOTA_INCREMENTS_TOTAL
                .with_label_values(&["other"])
                .get()
                > before
        );
        let families = prometheus::core::Collector::collect(&*metrics::QUOTA_INCREMENTS_TOTAL);
        assert!(families
            .iter()
            .flat_map(|family| family.get_metric())
            .flat_map(|metric| metric.get_label())
            .all(|label| label.get_value() != unique));
    }

    #[tokio::test]
    async fn test_check_without_record_is_full() {
        let (tracker, _, _) = tracker(june(10, 9));
        let status = tracker.check("fireplexity").await.unwrap();

        assert!(status.available);
        assert_eq!(status.used, 0);
        assert_eq!(status.limit, 50);
        assert_eq!(status.remaining, 50);
        assert_eq!(status.reset_date, Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap());
        assert_eq!(status.days_until_reset, 21);
    }

    #[tokio::test]
    async fn test_increment_counts_within_month() {
        let (tracker, _, clock) = tracker(june(1, 0));

        for n in 1..=7 {
            let record = tracker.increment("travel_buddy", "visa_requirements").await.unwrap();
            assert_eq!(record.call_count, n);
            clock.advance(Duration::days(3));
        }
    }

    #[tokio::test]
    async fn test_increment_after_rollover_restarts_at_one() {
        let (tracker, _, clock) = tracker(june(20, 12));

        for _ in 0..4 {
            tracker.increment("fireplexity", "search").await.unwrap();
        }
        let first = tracker.increment("fireplexity", "search").await.unwrap();
        assert_eq!(first.call_count, 5);

        clock.set(Utc.with_ymd_and_hms(2025, 7, 2, 8, 0, 0).unwrap());
        let record = tracker.increment("fireplexity", "scrape").await.unwrap();
        assert_eq!(record.call_count, 1);
        assert_eq!(record.endpoint, "scrape");
        assert_eq!(record.reset_date, Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap());
        assert_eq!(record.id, first.id);
    }

    #[tokio::test]
    async fn test_check_never_mutates() {
        let (tracker, store, clock) = tracker(june(5, 5));
        tracker.increment("perplexity", "chat").await.unwrap();
        tracker.increment("perplexity", "chat").await.unwrap();
        let before = store.quota_record("perplexity").await.unwrap();

        let first = tracker.check("perplexity").await.unwrap();
        for _ in 0..10 {
            assert_eq!(tracker.check("perplexity").await.unwrap(), first);
        }
        assert_eq!(store.quota_record("perplexity").await.unwrap(), before);

        // Rolled-over reads do not write either
        clock.set(Utc.with_ymd_and_hms(2025, 7, 5, 5, 0, 0).unwrap());
        assert_eq!(tracker.check("perplexity").await.unwrap().used, 0);
        assert_eq!(store.quota_record("perplexity").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_exhaustion_and_month_rollover() {
        let (tracker, _, clock) = tracker(june(3, 10));

        for _ in 0..50 {
            tracker.increment("fireplexity", "search").await.unwrap();
        }
        let status = tracker.check("fireplexity").await.unwrap();
        assert!(!status.available);
        assert_eq!(status.remaining, 0);
        let message = status.denial_message().unwrap();
        assert!(message.contains("fireplexity"));
        assert!(message.contains("July 1, 2025"));

        clock.set(status.reset_date + Duration::seconds(1));
        let status = tracker.check("fireplexity").await.unwrap();
        assert!(status.available);
        assert_eq!(status.remaining, 50);
        assert!(status.denial_message().is_none());
    }

    #[tokio::test]
    async fn test_increment_is_not_gated() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(june(3, 10));
        let config = QuotaConfig::default().with_service("tiny", 1);
        let tracker = QuotaTracker::new(store, Arc::new(clock), config);

        tracker.increment("tiny", "a").await.unwrap();
        let record = tracker.increment("tiny", "a").await.unwrap();
        assert_eq!(record.call_count, 2);
        let status = tracker.check("tiny").await.unwrap();
        assert_eq!(status.used, 2);
        assert_eq!(status.remaining, 0);
    }

    #[tokio::test]
    async fn test_free_form_service_names() {
        let (tracker, _, _) = tracker(june(3, 10));
        tracker.increment("exchange-rates v2", "latest").await.unwrap();
        let status = tracker.check("exchange-rates v2").await.unwrap();
        assert_eq!(status.used, 1);
        assert_eq!(status.limit, 100);
    }

    #[tokio::test]
    async fn test_check_all_includes_unconfigured_services() {
        let (tracker, _, _) = tracker(june(3, 10));
        tracker.increment("mapbox", "geocode").await.unwrap();

        let statuses = tracker.check_all().await.unwrap();
        let names: Vec<&str> = statuses.iter().map(|s| s.service.as_str()).collect();
        assert_eq!(names, vec!["fireplexity", "mapbox", "perplexity", "travel_buddy"]);
    }

    proptest! {
        #[test]
        fn prop_next_month_start_is_future_first_of_month(offset_secs in 0i64..(5 * 365 * 24 * 3600)) {
            let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(offset_secs);
            let next = next_month_start(now);
            prop_assert!(next > now);
            prop_assert_eq!(next.day(), 1);
            prop_assert!(next - now <= Duration::days(31));
            prop_assert!(days_until(next, now) >= 1);
        }
    }
}
