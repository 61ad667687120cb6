//! Rate Limit Store
//!
//! Process-local map from limiter key to its current fixed window. Nothing
//! is persisted: a restart clears every counter, and separate processes
//! keep separate counts.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::config::RateLimitConfig;
use super::manager::RateLimitResult;

/// Counter for one key's current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    /// Requests counted in this window
    pub count: u32,

    /// When the window ends
    pub reset_at: DateTime<Utc>,
}

impl RateLimitEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reset_at
    }
}

/// In-memory rate limit store
#[derive(Debug, Clone, Default)]
pub struct RateLimitStore {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key` and decide whether it is allowed
    ///
    /// The lookup, the limit check and the increment all happen under one
    /// lock acquisition, so concurrent callers on the same key cannot both
    /// take the last slot.
    pub fn check_and_consume(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitResult {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired(now) {
                if entry.count >= config.max_requests {
                    return RateLimitResult::denied(entry.reset_at, now);
                }
                entry.count += 1;
                return RateLimitResult::allowed(
                    config.max_requests - entry.count,
                    entry.reset_at,
                );
            }
        }

        // Absent or expired: open a fresh window
        let Some(reset_at) = config.window_end(now) else {
            warn!(key, window_ms = config.window_ms, "Rate limit window out of range, not limiting");
            return RateLimitResult::allowed(config.max_requests, now);
        };
        if config.max_requests == 0 {
            return RateLimitResult::denied(reset_at, now);
        }
        let entry = RateLimitEntry { count: 1, reset_at };
        entries.insert(key.to_string(), entry);
        RateLimitResult::allowed(config.max_requests - 1, entry.reset_at)
    }

    /// Remove windows that ended before `now`; returns how many were removed
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Current window for a key, if one is tracked
    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.lock().get(key).copied()
    }

    /// Drop the window for a key
    pub fn reset(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all windows
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn test_first_request_opens_window() {
        let store = RateLimitStore::new();
        let config = RateLimitConfig::new(5, 60_000);

        let result = store.check_and_consume("a:user:1", &config, t0());
        assert!(result.allowed);
        assert_eq!(result.remaining, 4);
        assert_eq!(result.reset_at, t0() + ms(60_000));

        let entry = store.get("a:user:1").unwrap();
        assert_eq!(entry.count, 1);
    }

    #[test]
    fn test_window_still_open_at_reset_instant() {
        let store = RateLimitStore::new();
        let config = RateLimitConfig::new(1, 1_000);

        assert!(store.check_and_consume("k", &config, t0()).allowed);
        // now == reset_at is still inside the window
        let result = store.check_and_consume("k", &config, t0() + ms(1_000));
        assert!(!result.allowed);
        assert_eq!(result.retry_after_secs, Some(1));

        let result = store.check_and_consume("k", &config, t0() + ms(1_001));
        assert!(result.allowed);
    }

    #[test]
    fn test_zero_limit_denies() {
        let store = RateLimitStore::new();
        let config = RateLimitConfig::new(0, 60_000);
        let result = store.check_and_consume("k", &config, t0());
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unrepresentable_window_allows_without_tracking() {
        let store = RateLimitStore::new();
        let config = RateLimitConfig::new(60, 10_000_000_000_000_000);

        let result = store.check_and_consume("general:ip:unknown", &config, t0());
        assert!(result.allowed);
        assert_eq!(result.remaining, 60);
        assert!(store.is_empty());

        let config = RateLimitConfig::new(60, u64::MAX);
        assert!(store.check_and_consume("general:ip:unknown", &config, t0()).allowed);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let store = RateLimitStore::new();
        store.check_and_consume("short", &RateLimitConfig::new(5, 1_000), t0());
        store.check_and_consume("long", &RateLimitConfig::new(5, 60_000), t0());
        assert_eq!(store.len(), 2);

        assert_eq!(store.sweep(t0() + ms(500)), 0);
        assert_eq!(store.sweep(t0() + ms(2_000)), 1);
        assert!(store.get("short").is_none());
        assert!(store.get("long").is_some());
    }

    #[test]
    fn test_reset_and_clear() {
        let store = RateLimitStore::new();
        let config = RateLimitConfig::general();
        store.check_and_consume("a", &config, t0());
        store.check_and_consume("b", &config, t0());

        assert!(store.reset("a"));
        assert!(!store.reset("a"));
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }
}
