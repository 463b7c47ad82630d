//! Central configuration for the passkey_rp_axum crate

use std::sync::LazyLock;

/// Mount point of the relying-party routes
/// Default: "/api"
pub static RP_ROUTE_PREFIX: LazyLock<String> =
    LazyLock::new(|| std::env::var("RP_ROUTE_PREFIX").unwrap_or_else(|_| "/api".to_string()));

/// Name of the caller session cookie
/// Default: "__Host-RpSession"
pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "__Host-RpSession".to_string())
});

/// Lifetime of a caller session in seconds
/// Default: 3600
pub static SESSION_TTL: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("SESSION_TTL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600)
});
