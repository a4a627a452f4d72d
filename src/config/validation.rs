//! Configuration validation
//!
//! This module provides validation logic for all configuration structures.

use super::models::*;
use crate::core::rate_limit::Category;
use std::net::IpAddr;
use tracing::debug;

/// Validation trait for configuration structures
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating server configuration");

        if self.host.is_empty() {
            return Err("Server host cannot be empty".to_string());
        }

        if self.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.workers == Some(0) {
            return Err("Worker count must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for CategoryPolicy {
    fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".to_string());
        }
        if self.window_secs == 0 {
            return Err("window_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating rate limit configuration");

        if self.policies.contains_key(&Category::Exempt) {
            return Err("the exempt category cannot carry a policy".to_string());
        }

        for category in Category::ALL {
            if let Some(policy) = self.policy(category) {
                policy
                    .validate()
                    .map_err(|e| format!("policy for {}: {}", category, e))?;
            }
        }

        if self.eviction.idle_multiplier == 0 {
            return Err("eviction.idle_multiplier must be at least 1".to_string());
        }
        if self.eviction.sweep_interval_secs == 0 {
            return Err("eviction.sweep_interval_secs must be greater than 0".to_string());
        }
        if self.eviction.max_buckets == 0 {
            return Err("eviction.max_buckets must be greater than 0".to_string());
        }

        if self.auto_block.enabled && self.auto_block.threshold == 0 {
            return Err("auto_block.threshold must be greater than 0".to_string());
        }

        if self.monitoring.alert_danger_threshold < self.monitoring.alert_warning_threshold {
            return Err(
                "monitoring.alert_danger_threshold must not be below the warning threshold"
                    .to_string(),
            );
        }

        if self.monitoring.retention_days == 0 {
            return Err("monitoring.retention_days must be greater than 0".to_string());
        }
        if self.monitoring.max_tracked_ips == 0 {
            return Err("monitoring.max_tracked_ips must be greater than 0".to_string());
        }
        if self.monitoring.retention_interval_secs == 0 {
            return Err("monitoring.retention_interval_secs must be greater than 0".to_string());
        }

        for ip in &self.blocked_ips {
            if ip.parse::<IpAddr>().is_err() {
                return Err(format!("blocked_ips entry is not an IP address: {}", ip));
            }
        }

        Ok(())
    }
}
