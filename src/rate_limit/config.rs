//! Rate Limit Configuration
//!
//! Fixed-window limits and the named presets applied per endpoint group.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default sweep interval for expired windows
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Longest window a preset may configure (365 days)
pub const MAX_WINDOW_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// A fixed-window limit: at most `max_requests` per `window_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    pub window_ms: u64,

    /// Requests allowed per window
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            window_ms,
            max_requests,
        }
    }

    /// Expensive AI generation calls
    pub const fn generate() -> Self {
        Self::new(10, 60_000)
    }

    /// Sign-in and sign-up attempts
    pub const fn auth() -> Self {
        Self::new(5, 60_000)
    }

    /// Password reset emails
    pub const fn password_reset() -> Self {
        Self::new(3, 900_000)
    }

    /// Everything else
    pub const fn general() -> Self {
        Self::new(60, 60_000)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// End of a window opened at `now`, or `None` if it is not representable
    pub fn window_end(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = TimeDelta::try_milliseconds(i64::try_from(self.window_ms).ok()?)?;
        now.checked_add_signed(window)
    }
}

/// Endpoint groups with their own limit and key prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPreset {
    Generate,
    Auth,
    PasswordReset,
    General,
}

impl RateLimitPreset {
    pub const ALL: [RateLimitPreset; 4] = [
        RateLimitPreset::Generate,
        RateLimitPreset::Auth,
        RateLimitPreset::PasswordReset,
        RateLimitPreset::General,
    ];

    /// Prefix used when building limiter keys for this group
    pub fn prefix(&self) -> &'static str {
        match self {
            RateLimitPreset::Generate => "generate",
            RateLimitPreset::Auth => "auth",
            RateLimitPreset::PasswordReset => "password-reset",
            RateLimitPreset::General => "general",
        }
    }
}

/// Limits for every preset, overridable from the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPresets {
    pub generate: RateLimitConfig,
    pub auth: RateLimitConfig,
    pub password_reset: RateLimitConfig,
    pub general: RateLimitConfig,
}

impl Default for RateLimitPresets {
    fn default() -> Self {
        Self {
            generate: RateLimitConfig::generate(),
            auth: RateLimitConfig::auth(),
            password_reset: RateLimitConfig::password_reset(),
            general: RateLimitConfig::general(),
        }
    }
}

impl RateLimitPresets {
    pub fn get(&self, preset: RateLimitPreset) -> RateLimitConfig {
        match preset {
            RateLimitPreset::Generate => self.generate,
            RateLimitPreset::Auth => self.auth,
            RateLimitPreset::PasswordReset => self.password_reset,
            RateLimitPreset::General => self.general,
        }
    }
}

/// Rate limiter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Enable rate limiting
    pub enabled: bool,

    /// How often expired windows are swept from memory
    pub sweep_interval_secs: u64,

    /// Per-preset limits
    pub presets: RateLimitPresets,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            presets: RateLimitPresets::default(),
        }
    }
}

impl RateLimitSettings {
    /// Disable rate limiting (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_values() {
        assert_eq!(RateLimitConfig::generate(), RateLimitConfig::new(10, 60_000));
        assert_eq!(RateLimitConfig::auth(), RateLimitConfig::new(5, 60_000));
        assert_eq!(RateLimitConfig::password_reset(), RateLimitConfig::new(3, 900_000));
        assert_eq!(RateLimitConfig::general(), RateLimitConfig::new(60, 60_000));
    }

    #[test]
    fn test_presets_lookup() {
        let presets = RateLimitPresets::default();
        assert_eq!(presets.get(RateLimitPreset::Auth).max_requests, 5);
        assert_eq!(
            presets.get(RateLimitPreset::PasswordReset).window(),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = RateLimitSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.sweep_interval(), Duration::from_secs(60));
        assert!(!RateLimitSettings::disabled().enabled);
    }

    #[test]
    fn test_partial_preset_override() {
        let settings: RateLimitSettings = toml::from_str(
            r#"
[presets.generate]
window_ms = 30000
max_requests = 3
"#,
        )
        .unwrap();
        assert_eq!(settings.presets.generate, RateLimitConfig::new(3, 30_000));
        assert_eq!(settings.presets.general, RateLimitConfig::general());
    }

    #[test]
    fn test_prefixes_are_distinct() {
        let mut prefixes: Vec<_> = RateLimitPreset::ALL.iter().map(|p| p.prefix()).collect();
        prefixes.sort();
        prefixes.dedup();
        assert_eq!(prefixes.len(), RateLimitPreset::ALL.len());
    }
}
