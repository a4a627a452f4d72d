//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::rate_limit::{
    AdmissionControl, InMemoryBlocklist, IpBlocklist, RateLimitMonitor, RateLimiter,
};
use std::sync::Arc;
use std::time::Instant;

/// HTTP server state shared across handlers and the admission middleware.
///
/// All fields are wrapped in Arc so worker threads share one limiter, one
/// block list and one monitor.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (shared read-only)
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub blocklist: Arc<dyn IpBlocklist>,
    pub monitor: Arc<RateLimitMonitor>,
    pub admission: Arc<AdmissionControl>,
    pub started_at: Instant,
}

impl AppState {
    /// State backed by the in-memory store and block list
    pub fn new(config: Config) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
        let blocklist = Arc::new(InMemoryBlocklist::from_config(
            &config.rate_limit().blocked_ips,
        ));
        Self::with_parts(config, limiter, blocklist)
    }

    /// State over caller-supplied limiter and block list
    pub fn with_parts(
        config: Config,
        limiter: Arc<RateLimiter>,
        blocklist: Arc<dyn IpBlocklist>,
    ) -> Self {
        let rate_limit = config.rate_limit();
        let monitor = Arc::new(RateLimitMonitor::new(
            limiter.clone(),
            blocklist.clone(),
            rate_limit.monitoring.clone(),
            rate_limit.auto_block.clone(),
        ));
        let admission = Arc::new(AdmissionControl::new(
            rate_limit,
            limiter.clone(),
            blocklist.clone(),
        ));

        Self {
            config: Arc::new(config),
            limiter,
            blocklist,
            monitor,
            admission,
            started_at: Instant::now(),
        }
    }

    /// Get gateway configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
