//! Client address resolution

use actix_web::http::header::HeaderMap;
use std::net::IpAddr;

/// Identity used when neither headers nor the transport yield an address
pub const UNKNOWN_CLIENT: &str = "unknown";

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Canonical text form of an address, so `2001:DB8::1`, `2001:db8::1` and
/// `::ffff:1.2.3.4` / `1.2.3.4` each share one identity. Values that are not
/// addresses are returned trimmed and unchanged.
pub fn normalize_ip(raw: &str) -> String {
    let raw = raw.trim();
    raw.parse::<IpAddr>()
        .map(|ip| ip.to_canonical().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Resolve the client address used as the bucket identity.
///
/// Precedence: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the
/// connection's peer address. Addresses are normalized. Never fails.
pub fn resolve_client_ip(headers: &HeaderMap, peer_addr: Option<&str>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(first) = header(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return normalize_ip(first);
    }

    if let Some(real_ip) = header(X_REAL_IP) {
        return normalize_ip(real_ip);
    }

    peer_addr
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(normalize_ip)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
