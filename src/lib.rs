//! Postgen Core Library
//!
//! Usage metering and request throttling for the post generation service:
//! monthly per-plan quotas, fixed-window rate limiting, the quota-gated
//! generation flow and the HTTP API that exposes them.

pub mod clock;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod usage;

pub use error::{CoreError, Result};
