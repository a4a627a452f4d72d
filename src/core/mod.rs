//! Core admission-control functionality
//!
//! Everything under `core` is independent of the HTTP framework: the
//! server layer only adapts requests into these types and maps the
//! outcomes back onto responses.

pub mod rate_limit;
