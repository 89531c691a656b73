//! Document Store
//!
//! The hosted document database is an external collaborator. This module
//! defines the operations the gatekeeper needs from it (point lookup,
//! overwrite, delete by key, filtered queries) and an in-memory backend
//! that can be persisted to a JSON snapshot.
//!
//! Every counter update is a single read followed by a single write. There
//! is no locking across the two, so concurrent increments on the same key
//! can be lost (last writer wins).

pub mod error;
pub mod memory;
pub mod records;
pub mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use records::{CacheEntry, QuotaRecord, RateLimitKey, RateLimitRecord};
pub use snapshot::StoreSnapshot;

/// Operations required from the backing document database
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Look up a cache entry by key
    async fn cache_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>>;

    /// Insert or replace the cache entry with the same key
    async fn put_cache_entry(&self, entry: CacheEntry) -> StoreResult<()>;

    /// All cache entries whose `expires_at` is strictly before `cutoff`
    async fn cache_entries_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<CacheEntry>>;

    /// Delete a cache entry, returning whether one existed
    async fn delete_cache_entry(&self, key: &str) -> StoreResult<bool>;

    /// Look up the quota record for a service
    async fn quota_record(&self, service: &str) -> StoreResult<Option<QuotaRecord>>;

    /// Insert or replace the quota record for its service
    async fn put_quota_record(&self, record: QuotaRecord) -> StoreResult<()>;

    /// All quota records
    async fn quota_records(&self) -> StoreResult<Vec<QuotaRecord>>;

    /// Look up a rate limit record
    async fn rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>>;

    /// Insert or replace a rate limit record
    async fn put_rate_limit_record(&self, record: RateLimitRecord) -> StoreResult<()>;

    /// All rate limit records belonging to a user
    async fn rate_limit_records_for_user(&self, user_id: &str)
        -> StoreResult<Vec<RateLimitRecord>>;

    /// Delete a rate limit record, returning whether one existed
    async fn delete_rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<bool>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn cache_entry(&self, key: &str) -> StoreResult<Option<CacheEntry>> {
        (**self).cache_entry(key).await
    }

    async fn put_cache_entry(&self, entry: CacheEntry) -> StoreResult<()> {
        (**self).put_cache_entry(entry).await
    }

    async fn cache_entries_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<CacheEntry>> {
        (**self).cache_entries_expiring_before(cutoff).await
    }

    async fn delete_cache_entry(&self, key: &str) -> StoreResult<bool> {
        (**self).delete_cache_entry(key).await
    }

    async fn quota_record(&self, service: &str) -> StoreResult<Option<QuotaRecord>> {
        (**self).quota_record(service).await
    }

    async fn put_quota_record(&self, record: QuotaRecord) -> StoreResult<()> {
        (**self).put_quota_record(record).await
    }

    async fn quota_records(&self) -> StoreResult<Vec<QuotaRecord>> {
        (**self).quota_records().await
    }

    async fn rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<Option<RateLimitRecord>> {
        (**self).rate_limit_record(key).await
    }

    async fn put_rate_limit_record(&self, record: RateLimitRecord) -> StoreResult<()> {
        (**self).put_rate_limit_record(record).await
    }

    async fn rate_limit_records_for_user(
        &self,
        user_id: &str,
    ) -> StoreResult<Vec<RateLimitRecord>> {
        (**self).rate_limit_records_for_user(user_id).await
    }

    async fn delete_rate_limit_record(&self, key: &RateLimitKey) -> StoreResult<bool> {
        (**self).delete_rate_limit_record(key).await
    }
}
