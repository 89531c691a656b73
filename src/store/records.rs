//! Persisted documents
//!
//! One document type per collection. Writes always replace the whole
//! document; there is no partial merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rate_limit::{ActionType, WindowScheme};

/// Cached API response or translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Document id
    pub id: Uuid,

    /// Caller-chosen lookup key (unique)
    pub key: String,

    /// Opaque payload
    pub data: serde_json::Value,

    /// When the payload was written
    pub cached_at: DateTime<Utc>,

    /// When the payload stops being fresh
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry is past its expiry at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Monthly call counter for one external service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Document id
    pub id: Uuid,

    /// Service name (unique), e.g. "fireplexity"
    pub service: String,

    /// Endpoint label of the most recent call
    pub endpoint: String,

    /// Calls made since `reset_date` was last moved
    pub call_count: u64,

    /// First instant of the month after the last write
    pub reset_date: DateTime<Utc>,

    /// Time of the most recent call
    pub last_call_at: DateTime<Utc>,
}

/// Lookup key for a rate limit record
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RateLimitKey {
    /// User the counter belongs to
    pub user_id: String,

    /// Action being counted
    pub action: ActionType,
}

impl RateLimitKey {
    /// Create a new key
    pub fn new(user_id: &str, action: ActionType) -> Self {
        Self {
            user_id: user_id.to_string(),
            action,
        }
    }
}

/// Per-user, per-action fixed-window counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// Document id
    pub id: Uuid,

    /// User the counter belongs to
    pub user_id: String,

    /// Action being counted
    pub action: ActionType,

    /// Window scheme the record was written under
    pub window: WindowScheme,

    /// Start of the current window (first call for hourly, day start for daily)
    pub window_start: DateTime<Utc>,

    /// Calls recorded in the window
    pub count: u32,
}

impl RateLimitRecord {
    /// Key this record is stored under
    pub fn key(&self) -> RateLimitKey {
        RateLimitKey::new(&self.user_id, self.action)
    }
}
