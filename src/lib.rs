//! TRIBE Gatekeeper Library
//!
//! Quota-and-cache layer that gates the relocation assistant's costly
//! external AI, search and finance API calls: an expiring cache, shared
//! monthly service quotas, per-user rate limits and a query classifier
//! that decides when live search is worth spending.

pub mod cache;
pub mod classifier;
pub mod clock;
pub mod config;
pub mod gate;
pub mod metrics;
pub mod metrics_server;
pub mod quota;
pub mod rate_limit;
pub mod store;
