//! HTTP middleware implementations
//!
//! - Admission gate: permanent IP blocks and per-category rate limiting

mod admission;
mod helpers;


pub use admission::{AdmissionGate, AdmissionGateService};
pub use helpers::{
    BLOCKED_CODE, apply_rate_limit_headers, blocked_response, prefers_json, redirect_response,
    request_info, throttled_response,
};
