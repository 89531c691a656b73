//! Gatekeeper
//!
//! Composes the classifier, rate limiter, quota tracker and cache into the
//! request flow used by the assistant's external-API features:
//!
//! 1. Route the query (live search or knowledge base)
//! 2. Check the user's rate limit for the action
//! 3. Check the shared service quota, when the action spends one
//! 4. Proceed, or deny with a reset time and a fallback hint
//! 5. Record usage only after the external call succeeded

pub mod report;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::cache::ExpiringCache;
use crate::classifier::{QueryClassification, QueryClassifier, Route};
use crate::clock::Clock;
use crate::config::Config;
use crate::quota::{QuotaStatus, QuotaTracker};
use crate::rate_limit::{ActionType, RateLimitStatus, RateLimiter};
use crate::store::{DocumentStore, StoreError};

pub use report::{UsageReport, UsageSummary};

const FALLBACK_HINT: &str = " Showing cached or general information instead.";

/// Errors raised by the gatekeeper
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// Backing store failed; never retried here
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Per-user window is full
    RateLimited,
    /// Shared monthly service quota is used up
    QuotaExhausted,
}

/// Structured denial returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Denial {
    /// Which check refused the request
    pub reason: DenialReason,

    /// User-facing explanation including the reset time
    pub message: String,

    /// Whether the caller should serve cached or static data instead
    pub use_fallback: bool,
}

/// Outcome of [`Gatekeeper::authorize`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The external call may go ahead
    Proceed {
        /// User's rate limit status for the action
        rate: RateLimitStatus,
        /// Service quota status, when a service was named
        quota: Option<QuotaStatus>,
    },
    /// The external call must not be made
    Denied(Denial),
}

impl Decision {
    /// Whether the external call may go ahead
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Proceed { .. })
    }
}

/// Routing decision with the classification that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRouting {
    /// Where the query should be answered from
    pub route: Route,

    /// Signals that drove the decision
    pub classification: QueryClassification,
}

/// Entry point gating costly external API calls
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tribe_gatekeeper::clock::SystemClock;
/// use tribe_gatekeeper::config::Config;
/// use tribe_gatekeeper::gate::{Decision, Gatekeeper};
/// use tribe_gatekeeper::rate_limit::ActionType;
/// use tribe_gatekeeper::store::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), tribe_gatekeeper::gate::GateError> {
/// let gate = Gatekeeper::new(MemoryStore::new(), Arc::new(SystemClock), &Config::default());
///
/// let decision = gate.authorize("u1", ActionType::LiveSearch, Some("fireplexity")).await?;
/// assert!(decision.is_allowed());
/// if let Decision::Proceed { quota, .. } = decision {
///     assert_eq!(quota.map(|q| q.limit), Some(50));
/// }
///
/// gate.record_success("u1", ActionType::LiveSearch, Some(("fireplexity", "/search"))).await?;
/// assert_eq!(gate.quota().check("fireplexity").await?.used, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Gatekeeper<S> {
    /// Per-user action limits
    rate_limiter: RateLimiter<S>,

    /// Shared monthly service quotas
    quota: QuotaTracker<S>,

    /// Expiring response cache
    cache: ExpiringCache<S>,

    /// Time source for reports
    clock: Arc<dyn Clock>,
}

impl<S: DocumentStore + Clone> Gatekeeper<S> {
    /// Build every component over one shared store handle
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            rate_limiter: RateLimiter::new(
                store.clone(),
                clock.clone(),
                config.rate_limit.clone(),
            ),
            quota: QuotaTracker::new(store.clone(), clock.clone(), config.quota.clone()),
            cache: ExpiringCache::new(store, clock.clone(), config.cache.clone()),
            clock,
        }
    }

    /// Underlying rate limiter
    pub fn rate_limiter(&self) -> &RateLimiter<S> {
        &self.rate_limiter
    }

    /// Underlying quota tracker
    pub fn quota(&self) -> &QuotaTracker<S> {
        &self.quota
    }

    /// Underlying expiring cache
    pub fn cache(&self) -> &ExpiringCache<S> {
        &self.cache
    }

    /// Decide whether `user_id` may perform `action`
    ///
    /// When `service` is given its monthly quota is checked after the rate
    /// limit. Nothing is recorded; call [`record_success`](Self::record_success)
    /// once the external call went through.
    pub async fn authorize(
        &self,
        user_id: &str,
        action: ActionType,
        service: Option<&str>,
    ) -> Result<Decision, GateError> {
        let rate = self.rate_limiter.check(user_id, action).await?;
        if !rate.allowed {
            warn!(
                user_id,
                action = action.as_str(),
                used = rate.used,
                limit = rate.limit,
                "Rate limit reached"
            );
            return Ok(Decision::Denied(Denial {
                reason: DenialReason::RateLimited,
                message: rate.denial_message().unwrap_or_default(),
                use_fallback: rate.graceful_fallback,
            }));
        }

        let quota = match service {
            Some(service) => {
                let status = self.quota.check(service).await?;
                if !status.available {
                    warn!(service, used = status.used, "Service quota exhausted");
                    let mut message = status.denial_message().unwrap_or_default();
                    if rate.graceful_fallback {
                        message.push_str(FALLBACK_HINT);
                    }
                    return Ok(Decision::Denied(Denial {
                        reason: DenialReason::QuotaExhausted,
                        message,
                        use_fallback: rate.graceful_fallback,
                    }));
                }
                Some(status)
            }
            None => None,
        };

        Ok(Decision::Proceed { rate, quota })
    }

    /// Count a successful external call against the user and, if given,
    /// the `(service, endpoint)` quota
    pub async fn record_success(
        &self,
        user_id: &str,
        action: ActionType,
        service: Option<(&str, &str)>,
    ) -> Result<(), GateError> {
        self.rate_limiter.increment(user_id, action).await?;
        if let Some((service, endpoint)) = service {
            self.quota.increment(service, endpoint).await?;
        }
        Ok(())
    }

    /// Decide whether a chat query goes to live search or the knowledge base
    pub fn route_query(
        &self,
        text: &str,
        kb_confidence: f64,
        kb_result_count: usize,
    ) -> QueryRouting {
        let (classification, route) = QueryClassifier::route(text, kb_confidence, kb_result_count);
        QueryRouting {
            route,
            classification,
        }
    }

    /// Read-only usage snapshot for one user
    pub async fn usage_report(&self, user_id: &str) -> Result<UsageReport, GateError> {
        let rate_limits = self.rate_limiter.check_all(user_id).await?;
        let quotas = self.quota.check_all().await?;
        Ok(UsageReport::build(
            self.clock.now(),
            user_id,
            rate_limits,
            quotas,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{
        CacheEntry, MemoryStore, QuotaRecord, RateLimitKey, RateLimitRecord, StoreResult,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn gatekeeper(config: &Config) -> (Gatekeeper<MemoryStore>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap());
        let gate = Gatekeeper::new(MemoryStore::new(), Arc::new(clock.clone()), config);
        (gate, clock)
    }

    #[tokio::test]
    async fn test_proceed_then_record() {
        let (gate, _) = gatekeeper(&Config::default());

        let decision = gate
            .authorize("u1", ActionType::LiveSearch, Some("fireplexity"))
            .await
            .unwrap();
        match &decision {
            Decision::Proceed { rate, quota } => {
                assert_eq!(rate.used, 0);
                assert_eq!(quota.as_ref().unwrap().limit, 50);
            }
            Decision::Denied(d) => panic!("unexpected denial: {:?}", d),
        }

        gate.record_success("u1", ActionType::LiveSearch, Some(("fireplexity", "/search")))
            .await
            .unwrap();

        let rate = gate.rate_limiter().check("u1", ActionType::LiveSearch).await.unwrap();
        assert_eq!(rate.used, 1);
        let quota = gate.quota().check("fireplexity").await.unwrap();
        assert_eq!(quota.used, 1);
    }

    #[tokio::test]
    async fn test_live_search_denied_on_eleventh_call() {
        let (gate, clock) = gatekeeper(&Config::default());

        for _ in 0..10 {
            assert!(gate
                .authorize("u1", ActionType::LiveSearch, None)
                .await
                .unwrap()
                .is_allowed());
            gate.record_success("u1", ActionType::LiveSearch, None).await.unwrap();
        }

        let Decision::Denied(denial) = gate.authorize("u1", ActionType::LiveSearch, None).await.unwrap()
        else {
            panic!("expected denial");
        };
        assert_eq!(denial.reason, DenialReason::RateLimited);
        assert!(denial.use_fallback);
        assert!(denial.message.contains("00:00 UTC"));

        // Next UTC day opens a fresh window
        clock.set(Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 1).unwrap());
        assert!(gate
            .authorize("u1", ActionType::LiveSearch, None)
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn test_no_fallback_for_protocol_generation() {
        let (gate, _) = gatekeeper(&Config::default());
        for _ in 0..5 {
            gate.record_success("u1", ActionType::ProtocolGeneration, None)
                .await
                .unwrap();
        }

        let Decision::Denied(denial) = gate
            .authorize("u1", ActionType::ProtocolGeneration, None)
            .await
            .unwrap()
        else {
            panic!("expected denial");
        };
        assert!(!denial.use_fallback);
        assert!(!denial.message.contains("cached"));
    }

    #[tokio::test]
    async fn test_quota_exhausted_denies_every_user() {
        let mut config = Config::default();
        config.quota = config.quota.with_service("travel_buddy", 2);
        let (gate, clock) = gatekeeper(&config);

        gate.record_success("u1", ActionType::CostOfLiving, Some(("travel_buddy", "/prices")))
            .await
            .unwrap();
        gate.record_success("u2", ActionType::CostOfLiving, Some(("travel_buddy", "/prices")))
            .await
            .unwrap();

        let Decision::Denied(denial) = gate
            .authorize("u3", ActionType::CostOfLiving, Some("travel_buddy"))
            .await
            .unwrap()
        else {
            panic!("expected denial");
        };
        assert_eq!(denial.reason, DenialReason::QuotaExhausted);
        assert!(denial.use_fallback);
        assert!(denial.message.contains("April 1, 2025"));

        // New month resets the shared quota
        clock.advance(TimeDelta::days(17));
        assert!(gate
            .authorize("u3", ActionType::CostOfLiving, Some("travel_buddy"))
            .await
            .unwrap()
            .is_allowed());
    }

    #[tokio::test]
    async fn test_disabled_rate_limit_still_checks_quota() {
        let mut config = Config::default();
        config.rate_limit.enabled = false;
        config.quota = config.quota.with_service("perplexity", 1);
        let (gate, _) = gatekeeper(&config);

        gate.record_success("u1", ActionType::LiveSearch, Some(("perplexity", "/ask")))
            .await
            .unwrap();
        let decision = gate
            .authorize("u1", ActionType::LiveSearch, Some("perplexity"))
            .await
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Denied(Denial {
                reason: DenialReason::QuotaExhausted,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_route_query() {
        let (gate, _) = gatekeeper(&Config::default());
        let routing = gate.route_query("What is the current visa processing time in 2025?", 0.9, 5);
        assert_eq!(routing.route, Route::LiveSearch);
        assert!(routing.classification.is_policy_related);

        let routing = gate.route_query("Tell me about your company history", 0.9, 5);
        assert_eq!(routing.route, Route::Knowledge);
    }

    #[tokio::test]
    async fn test_usage_report() {
        let (gate, _) = gatekeeper(&Config::default());
        gate.record_success("u1", ActionType::Translation, Some(("perplexity", "/t")))
            .await
            .unwrap();

        let report = gate.usage_report("u1").await.unwrap();
        assert_eq!(report.rate_limits.len(), ActionType::ALL.len());
        let translation = report
            .rate_limits
            .iter()
            .find(|s| s.action == ActionType::Translation)
            .unwrap();
        assert_eq!(translation.used, 1);
        assert!(report.quotas.iter().any(|q| q.service == "perplexity" && q.used == 1));
        assert!(report.quotas.iter().any(|q| q.service == "fireplexity"));
    }

    #[derive(Debug)]
    struct UnavailableStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    #[async_trait]
    impl DocumentStore for UnavailableStore {
        async fn cache_entry(&self, _key: &str) -> StoreResult<Option<CacheEntry>> {
            down()
        }
        async fn put_cache_entry(&self, _entry: CacheEntry) -> StoreResult<()> {
            down()
        }
        async fn cache_entries_expiring_before(
            &self,
            _cutoff: DateTime<Utc>,
        ) -> StoreResult<Vec<CacheEntry>> {
            down()
        }
        async fn delete_cache_entry(&self, _key: &str) -> StoreResult<bool> {
            down()
        }
        async fn quota_record(&self, _service: &str) -> StoreResult<Option<QuotaRecord>> {
            down()
        }
        async fn put_quota_record(&self, _record: QuotaRecord) -> StoreResult<()> {
            down()
        }
        async fn quota_records(&self) -> StoreResult<Vec<QuotaRecord>> {
            down()
        }
        async fn rate_limit_record(
            &self,
            _key: &RateLimitKey,
        ) -> StoreResult<Option<RateLimitRecord>> {
            down()
        }
        async fn put_rate_limit_record(&self, _record: RateLimitRecord) -> StoreResult<()> {
            down()
        }
        async fn rate_limit_records_for_user(
            &self,
            _user_id: &str,
        ) -> StoreResult<Vec<RateLimitRecord>> {
            down()
        }
        async fn delete_rate_limit_record(&self, _key: &RateLimitKey) -> StoreResult<bool> {
            down()
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = Gatekeeper::new(Arc::new(UnavailableStore), clock, &Config::default());

        let err = gate
            .authorize("u1", ActionType::ChatMessage, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Store(StoreError::Unavailable(_))));

        assert!(gate.record_success("u1", ActionType::ChatMessage, None).await.is_err());
        assert!(gate.cache().get("rate:USD:EUR").await.is_err());
    }
}
