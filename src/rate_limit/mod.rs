//! Rate Limiting Module
//!
//! Per-user, per-action call counters over fixed windows, gating the
//! assistant's costly external features (live search, protocol generation,
//! translation and so on).
//!
//! # Features
//!
//! - Exhaustive action table with limit, window, cost and fallback flag
//! - Hourly windows opened by the first call, daily windows on UTC days
//! - Lazy reset: a closed window reads as zero until the next increment
//! - Admin reset of one or all of a user's counters
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Rate Limiter                           │
//! │        check()  ·  increment()  ·  reset_for_user()          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │ ActionType  │  │ Window      │  │ Config      │         │
//! │  │ policies    │  │ arithmetic  │  │ overrides   │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Document Store (rate limit records)     │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod action;
pub mod config;
pub mod limiter;
pub mod window;

pub use action::{ActionPolicy, ActionType, UnknownActionError};
pub use config::RateLimitConfig;
pub use limiter::{RateLimitStatus, RateLimiter};
pub use window::{day_start, effective_count, WindowScheme};
