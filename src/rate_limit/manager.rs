//! Rate Limiter
//!
//! Fixed-window limiter shared by every request handler. The limiter never
//! fails: a key with no prior state is simply not limited yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::config::{RateLimitConfig, RateLimitPreset, RateLimitSettings};
use super::key::rate_limit_key;
use super::store::RateLimitStore;
use crate::clock::Clock;
use crate::metrics;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Requests left in the current window after this one
    pub remaining: u32,

    /// When the current window ends
    pub reset_at: DateTime<Utc>,

    /// Seconds until the window ends (only when denied)
    pub retry_after_secs: Option<u64>,
}

impl RateLimitResult {
    /// Create an allowed result
    pub fn allowed(remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            retry_after_secs: None,
        }
    }

    /// Create a denied result; the retry hint is never below one second
    pub fn denied(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let wait_ms = (reset_at - now).num_milliseconds().max(0) as u64;
        Self {
            allowed: false,
            remaining: 0,
            reset_at,
            retry_after_secs: Some(wait_ms.div_ceil(1000).max(1)),
        }
    }
}

/// Fixed-window rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    store: RateLimitStore,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(settings: RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            store: RateLimitStore::new(),
            clock,
        }
    }

    /// Check and count one request against `key`
    pub fn check_and_consume(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = self.clock.now();
        if !self.settings.enabled {
            let reset_at = config.window_end(now).unwrap_or(now);
            return RateLimitResult::allowed(config.max_requests, reset_at);
        }

        let result = self.store.check_and_consume(key, config, now);
        if !result.allowed {
            debug!(key, retry_after = ?result.retry_after_secs, "Rate limit exceeded");
        }
        result
    }

    /// Check a request from a caller against one of the named presets
    pub fn check_preset(
        &self,
        preset: RateLimitPreset,
        user_id: Option<&str>,
        forwarded_for: Option<&str>,
    ) -> RateLimitResult {
        let key = rate_limit_key(preset, user_id, forwarded_for);
        let config = self.config_for(preset);
        let result = self.check_and_consume(&key, &config);

        let outcome = if result.allowed { "allowed" } else { "denied" };
        metrics::RATE_LIMIT_DECISIONS_TOTAL
            .with_label_values(&[preset.prefix(), outcome])
            .inc();
        metrics::RATE_LIMIT_ENTRIES.set(self.store.len() as i64);
        result
    }

    /// Limit configured for a preset
    pub fn config_for(&self, preset: RateLimitPreset) -> RateLimitConfig {
        self.settings.presets.get(preset)
    }

    /// Remove expired windows
    pub fn sweep(&self) -> usize {
        let removed = self.store.sweep(self.clock.now());
        metrics::RATE_LIMIT_ENTRIES.set(self.store.len() as i64);
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Swept expired rate limit windows");
        }
        removed
    }

    /// Run [`RateLimiter::sweep`] every `interval` until the handle is aborted
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        info!(interval_secs = interval.as_secs(), "Starting rate limit sweeper");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }

    /// Current settings
    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Underlying store
    pub fn store(&self) -> &RateLimitStore {
        &self.store
    }
}
