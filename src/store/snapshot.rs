//! JSON snapshot persistence
//!
//! Lets short-lived processes (the CLI) keep counters and cache entries
//! between invocations by loading the store at startup and writing it back
//! on exit.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::records::{CacheEntry, QuotaRecord, RateLimitRecord};
use super::{MemoryStore, StoreResult};

/// Every document in a store, one list per collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    /// Cache entries
    pub cache_entries: Vec<CacheEntry>,

    /// Quota records
    pub quota_records: Vec<QuotaRecord>,

    /// Rate limit records
    pub rate_limit_records: Vec<RateLimitRecord>,
}

impl MemoryStore {
    /// Load a store from a snapshot file; a missing file gives an empty store
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path).await? {
            tracing::debug!("Snapshot not found at {:?}, starting empty", path);
            return Ok(Self::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        tracing::debug!(
            cache_entries = snapshot.cache_entries.len(),
            quota_records = snapshot.quota_records.len(),
            rate_limit_records = snapshot.rate_limit_records.len(),
            "Loaded snapshot from {:?}",
            path
        );

        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the whole store to a snapshot file, creating parent directories
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let snapshot = self.snapshot().await;
        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, content).await?;
        tracing::debug!("Saved snapshot to {:?}", path);

        Ok(())
    }
}
