//! Helper functions for the admission middleware

use crate::core::rate_limit::{Decision, RequestInfo, resolve_client_ip};
use actix_web::HttpResponse;
use actix_web::dev::ServiceRequest;
use actix_web::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::json;

/// Machine-readable code on 403 responses for blocked addresses
pub const BLOCKED_CODE: &str = "PERMANENTLY_BLOCKED";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Whether the caller expects JSON rather than an HTML redirect
pub fn prefers_json(headers: &HeaderMap, path: &str) -> bool {
    if path.starts_with("/api/") {
        return true;
    }

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if header("x-requested-with").is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest")) {
        return true;
    }

    // JSON listed ahead of HTML in Accept
    header("accept").is_some_and(|accept| {
        let accept = accept.to_ascii_lowercase();
        match (accept.find("application/json"), accept.find("text/html")) {
            (Some(json), Some(html)) => json < html,
            (Some(_), None) => true,
            _ => false,
        }
    })
}

/// Build the admission view of an incoming request
pub fn request_info(req: &ServiceRequest) -> RequestInfo {
    let headers = req.headers();
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    let client_ip = resolve_client_ip(headers, peer.as_deref());

    let mut info = RequestInfo::new(req.path(), req.method().as_str(), client_ip)
        .with_wants_json(prefers_json(headers, req.path()));
    if let Some(ua) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        info = info.with_user_agent(ua);
    }
    info
}

/// Add limit headers; denied responses also get the reset time
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_LIMIT),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(X_RATELIMIT_REMAINING),
        HeaderValue::from(decision.remaining),
    );
    if !decision.allowed {
        headers.insert(
            HeaderName::from_static(X_RATELIMIT_RESET),
            HeaderValue::from(decision.reset_after_secs),
        );
        headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.retry_after_secs));
    }
}

/// 429 with a JSON body
pub fn throttled_response(decision: &Decision) -> HttpResponse {
    let mut response = HttpResponse::TooManyRequests().json(json!({
        "error": "Rate limit exceeded",
        "message": format!(
            "Too many requests. Please try again in {} seconds.",
            decision.retry_after_secs
        ),
        "retryAfter": decision.retry_after_secs,
        "category": decision.category,
        "limit": decision.limit,
    }));
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

/// Redirect back to the form with a marker the page can render
pub fn redirect_response(path: &str, decision: &Decision) -> HttpResponse {
    let mut response = HttpResponse::Found()
        .insert_header((header::LOCATION, format!("{}?ratelimit=1", path)))
        .finish();
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

/// 403 for addresses on the permanent block list
pub fn blocked_response() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({
        "error": "Access denied: your IP address has been permanently blocked",
        "code": BLOCKED_CODE,
    }))
}
