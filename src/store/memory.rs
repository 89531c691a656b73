//! In-memory document store
//!
//! Three keyed collections behind async read/write locks. Cloning the store
//! shares the same collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::records::{CacheEntry, QuotaRecord, RateLimitKey, RateLimitRecord};
use super::snapshot::StoreSnapshot;
use super::{DocumentStore, StoreResult};

/// In-memory document store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Cache entries by key
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,

    /// Quota records by service
    quotas: Arc<RwLock<HashMap<String, QuotaRecord>>>,

    /// Rate limit records by (user, action)
    rate_limits: Arc<RwLock<HashMap<RateLimitKey, RateLimitRecord>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let cache = snapshot
            .cache_entries
            .into_iter()
            .map(|e| (e.key.clone(), e))
            .collect();
        let quotas = snapshot
            .quota_records
            .into_iter()
            .map(|r| (r.service.clone(), r))
            .collect();
        let rate_limits = snapshot
            .rate_limit_records
            .into_iter()
            .map(|r| (r.key(), r))
            .collect();

        Self {
            cache: Arc::new(RwLock::new(cache)),
            quotas: Arc::new(RwLock::new(quotas)),
            rate_limits: Arc::new(RwLock::new(rate_limits)),
        }
    }

    /// Copy every document out of the store
    pub async fn snapshot(&self) -> StoreSnapshot {
        let cache = self.cache.read().await;
        let quotas = self.quotas.read().await;
        let rate_limits = self.rate_limits.read().await;

        StoreSnapshot {
            cache_entries: cache.values().cloned().collect(),
            quota_records: quotas.values().cloned().collect(),
            rate_limit_records: rate_limits.values().cloned().collect(),
        }
    }

    /// Number of cache entries, expired ones included
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Number of rate limit records
    pub async fn rate_limit_len(&self) -> usize {
        self.rate_limits.read().await.len()
    }

    /// Remove every document
    pub async fn clear(&self) {
        self.cache.write().await.clear();
        self.quotas.write().await.clear();
        self.rate_limits.write().await.clear();
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn cache_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        let cache = self.cache.read().await;
        Ok(cache.get(key).cloned())
    }

    async fn put_cache_entry(&self, entry: CacheEntry) -> StoreResult<()> {
        let mut cache = self.cache.write().await;
        cache.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn cache_entries_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<CacheEntry>> {
        let cache = self.cache.read().await;
        Ok(cache
            .values()
            .filter(|e| e.expires_at < cutoff)
            .cloned()
            .collect())
    }

    async fn delete_cache_entry(&self, key: &str) -> StoreResult<bool> {
        let mut cache = self.cache.write().await;
        Ok(cache.remove(key).is_some())
    }

    async fn quota_record(&self, service: &str) -> StoreResult<Option<QuotaRecord>> {
        let quotas = self.quotas.read().await;
        Ok(quotas.get(service).cloned())
    }

    async fn put_quota_record(&self, record: QuotaRecord) -> StoreResult<()> {
        let mut quotas = self.quotas.write().await;
        quotas.insert(record.service.clone(), record);
        Ok(())
    }

    async fn quota_records(&self) -> StoreResult<Vec<QuotaRecord>> {
        let quotas = self.quotas.read().await;
        Ok(quotas.values().cloned().collect())
    }

    async fn rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
        let rate_limits = self.rate_limits.read().await;
        Ok(rate_limits.get(key).cloned())
    }

    async fn put_rate_limit_record(&self, record: RateLimitRecord) -> StoreResult<()> {
        let mut rate_limits = self.rate_limits.write().await;
        rate_limits.insert(record.key(), record);
        Ok(())
    }

    async fn rate_limit_records_for_user(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<RateLimitRecord>> {
        let rate_limits = self.rate_limits.read().await;
        Ok(rate_limits
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<bool> {
        let mut rate_limits = self.rate_limits.write().await;
        Ok(rate_limits.remove(key).is_some())
    }
}
