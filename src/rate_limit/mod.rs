//! Rate Limiting Module
//!
//! Per-identity, per-endpoint-group request limiting with fixed windows.
//!
//! # Features
//!
//! - Fixed-window counters keyed by `prefix:user:<id>` or `prefix:ip:<addr>`
//! - Named presets per endpoint sensitivity (generate, auth, password reset, general)
//! - Lazy expiry on access plus a periodic background sweep
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Rate Limiter                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │  Generate   │  │    Auth     │  │  General    │  ...    │
//! │  │  10 / 60s   │  │   5 / 60s   │  │  60 / 60s   │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │            Rate Limit Store (in-memory)              │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod key;
pub mod manager;
pub mod store;

pub use config::{
    RateLimitConfig, RateLimitPreset, RateLimitPresets, RateLimitSettings, MAX_WINDOW_MS,
};
pub use key::{client_ip, rate_limit_key};
pub use manager::{RateLimitResult, RateLimiter};
pub use store::{RateLimitEntry, RateLimitStore};
