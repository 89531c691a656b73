// Prometheus metrics for the gatekeeper
//
// Exposes metrics on /metrics HTTP endpoint:
// - Cache lookups by outcome (counter)
// - Cache sweep deletions (counter)
// - Rate limit and quota checks by result (counter)
// - Quota increments per service (counter)
// - Query routing decisions (counter)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // Cache metrics
    pub static ref CACHE_LOOKUPS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("cache_lookups_total", "Cache lookups by outcome (hit, stale, miss)"),
        &["outcome"]
    ).expect("Failed to create cache lookups metric");

    pub static ref CACHE_ENTRIES_SWEPT_TOTAL: IntCounter = IntCounter::new(
        "cache_entries_swept_total",
        "Total number of expired cache entries deleted by sweeps"
    ).expect("Failed to create cache sweep metric");

    // Limit metrics
    pub static ref RATE_LIMIT_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("rate_limit_checks_total", "Rate limit checks by action and result"),
        &["action", "result"]
    ).expect("Failed to create rate limit checks metric");

    pub static ref QUOTA_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_checks_total", "Service quota checks by result"),
        &["service", "result"]
    ).expect("Failed to create quota checks metric");

    pub static ref QUOTA_INCREMENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_increments_total", "Recorded calls per external service"),
        &["service"]
    ).expect("Failed to create quota increments metric");

    // Classifier metrics
    pub static ref QUERY_CLASSIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("query_classifications_total", "Query routing decisions"),
        &["route"]
    ).expect("Failed to create query classifications metric");
}

/// Initialize metrics registry - must be called once at daemon startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(CACHE_LOOKUPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CACHE_ENTRIES_SWEPT_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMIT_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_INCREMENTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUERY_CLASSIFICATIONS_TOTAL.clone()))?;
    Ok(())
}

/// Label value for an allow/deny outcome
pub fn result_label(allowed: bool) -> &'static str {
    if allowed {
        "allowed"
    } else {
        "denied"
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_metrics() {
        let before = CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).get();
        CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
        assert!(CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).get() > before);
    }

    #[test]
    fn test_result_label() {
        assert_eq!(result_label(true), "allowed");
        assert_eq!(result_label(false), "denied");
    }

    #[test]
    fn test_gather_after_init() {
        // May fail if another test already registered, which is fine
        let _ = init();

        QUOTA_INCREMENTS_TOTAL.with_label_values(&["fireplexity"]).inc();
        let text = gather_metrics().unwrap();
        assert!(text.contains("quota_increments_total"));
    }
}
