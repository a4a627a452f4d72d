//! Configuration data models
//!
//! This module defines all configuration structures used throughout the gateway.

#![allow(missing_docs)]

pub mod gateway;
pub mod logging;
pub mod rate_limit;
pub mod server;

// Re-export all configuration types
pub use gateway::*;
pub use logging::*;
pub use rate_limit::*;
pub use server::*;

/// Default values for configuration
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default server port
pub fn default_port() -> u16 {
    8080
}

/// Default log level directive
pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

/// Buckets idle for this many windows are evicted
pub fn default_idle_multiplier() -> u32 {
    2
}

pub fn default_sweep_interval_secs() -> u64 {
    60
}

/// Bucket count above which an inline sweep runs on the request path
pub fn default_max_buckets() -> usize {
    100_000
}

pub fn default_auto_block_threshold() -> u32 {
    15
}

pub fn default_history_per_ip() -> usize {
    100
}

pub fn default_alert_warning_threshold() -> u32 {
    5
}

pub fn default_alert_danger_threshold() -> u32 {
    10
}

pub fn default_retention_days() -> u32 {
    7
}

pub fn default_max_tracked_ips() -> usize {
    100_000
}

/// Hourly
pub fn default_retention_interval_secs() -> u64 {
    3600
}
