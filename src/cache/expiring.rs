//! Expiring Cache
//!
//! Key/value cache with a time-to-live per entry and soft expiry: an entry
//! past its expiry is still returned, flagged `expired`, until a sweep
//! deletes it. The caller decides whether stale data is good enough.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::{CacheConfig, CacheTtl};
use super::error::CacheError;
use crate::clock::Clock;
use crate::metrics;
use crate::store::{CacheEntry, DocumentStore, MemoryStore, StoreResult};

/// Value read from the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue<T = serde_json::Value> {
    /// Stored payload
    pub data: T,

    /// When the payload was written
    pub cached_at: DateTime<Utc>,

    /// Whether the payload is past its expiry
    pub expired: bool,
}

/// Soft-expiry cache over the document store
#[derive(Debug, Clone)]
pub struct ExpiringCache<S> {
    /// Backing store
    store: S,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Configuration
    config: CacheConfig,
}

impl<S: DocumentStore> ExpiringCache<S> {
    /// Create a new cache
    pub fn new(store: S, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a key; `None` when nothing was ever stored
    pub async fn get(&self, key: &str) -> StoreResult<Option<CachedValue>> {
        let now = self.clock.now();

        let Some(entry) = self.store.cache_entry(key).await? else {
            metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
            debug!(key, "Cache miss");
            return Ok(None);
        };

        let expired = entry.is_expired_at(now);
        let outcome = if expired { "stale" } else { "hit" };
        metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
        debug!(key, expired, "Cache {}", outcome);

        Ok(Some(CachedValue {
            data: entry.data,
            cached_at: entry.cached_at,
            expired,
        }))
    }

    /// Store `data` under `key`, replacing any previous entry
    pub async fn set(&self, key: &str, data: serde_json::Value, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let id = match self.store.cache_entry(key).await? {
            Some(existing) => existing.id,
            None => Uuid::new_v4(),
        };

        debug!(key, %expires_at, "Cache set");
        self.store
            .put_cache_entry(CacheEntry {
                id,
                key: key.to_string(),
                data,
                cached_at: now,
                expires_at,
            })
            .await
    }

    /// Store `data` with the configured TTL for its kind
    pub async fn set_for(&self, key: &str, data: serde_json::Value, kind: CacheTtl) -> StoreResult<()> {
        self.set(key, data, self.config.ttl_for(kind)).await
    }

    /// Delete every entry whose expiry has passed; returns how many were deleted
    pub async fn sweep_expired(&self) -> StoreResult<usize> {
        let now = self.clock.now();
        let expired = self.store.cache_entries_expiring_before(now).await?;

        let mut deleted = 0;
        for entry in &expired {
            if self.store.delete_cache_entry(&entry.key).await? {
                deleted += 1;
            }
        }

        metrics::CACHE_ENTRIES_SWEPT_TOTAL.inc_by(deleted as u64);
        info!(deleted, "Swept expired cache entries");
        Ok(deleted)
    }

    /// Typed lookup; a payload of the wrong shape is an error
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<CachedValue<T>>, CacheError> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };

        let data = serde_json::from_value(value.data).map_err(|source| CacheError::Decode {
            key: key.to_string(),
            source,
        })?;

        Ok(Some(CachedValue {
            data,
            cached_at: value.cached_at,
            expired: value.expired,
        }))
    }

    /// Typed store
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        data: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(data).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value, ttl).await?;
        Ok(())
    }
}

/// Sweep expired entries out of a snapshot file
///
/// The file is reloaded right before the sweep, so records other processes
/// saved since this one started are kept. It is rewritten only when an
/// entry was actually removed.
pub async fn sweep_snapshot(
    path: &Path,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
) -> StoreResult<usize> {
    let store = MemoryStore::load_from_path(path).await?;
    let deleted = ExpiringCache::new(store.clone(), clock, config)
        .sweep_expired()
        .await?;

    if deleted > 0 {
        store.save_to_path(path).await?;
    }
    Ok(deleted)
}
