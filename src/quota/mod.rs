//! Service Quota Module
//!
//! Organisation-wide monthly caps on calls to paid external APIs
//! (search, travel data). Counters reset lazily when the calendar month
//! changes; there is no background job.

pub mod config;
pub mod tracker;

pub use config::QuotaConfig;
pub use tracker::{
    days_until, effective_call_count, is_rolled_over, next_month_start, QuotaStatus, QuotaTracker,
};
