//! Limiter Key Construction
//!
//! Authenticated callers are limited per user id; anonymous callers per the
//! first address in `X-Forwarded-For`. Anonymous clients behind the same
//! proxy or NAT therefore share one bucket.

use super::config::RateLimitPreset;

/// Address used when no forwarded address is available
pub const UNKNOWN_IP: &str = "unknown";

/// Build the key `prefix:user:<id>` or `prefix:ip:<addr>`
pub fn rate_limit_key(
    preset: RateLimitPreset,
    user_id: Option<&str>,
    forwarded_for: Option<&str>,
) -> String {
    let prefix = preset.prefix();
    match user_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("{}:user:{}", prefix, id),
        None => format!("{}:ip:{}", prefix, client_ip(forwarded_for)),
    }
}

/// First entry of an `X-Forwarded-For` header value
pub fn client_ip(forwarded_for: Option<&str>) -> &str {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_IP)
}
