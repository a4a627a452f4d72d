//! Rate limiting configuration

use super::*;
use crate::core::rate_limit::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting (the permanent block list is enforced regardless)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Refill strategy shared by every category
    #[serde(default)]
    pub strategy: RateLimitStrategy,
    /// Per-category overrides on top of the built-in policy table
    #[serde(default)]
    pub policies: HashMap<Category, PolicyOverride>,
    /// Idle bucket eviction
    #[serde(default)]
    pub eviction: EvictionConfig,
    /// Automatic permanent blocking of repeat offenders
    #[serde(default)]
    pub auto_block: AutoBlockConfig,
    /// Blocked request history and alerting
    #[serde(default)]
    pub monitoring: MonitorConfig,
    /// Addresses blocked permanently at startup
    #[serde(default)]
    pub blocked_ips: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: RateLimitStrategy::default(),
            policies: HashMap::new(),
            eviction: EvictionConfig::default(),
            auto_block: AutoBlockConfig::default(),
            monitoring: MonitorConfig::default(),
            blocked_ips: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    /// Effective policy for a category: built-in default with any override applied.
    ///
    /// Returns `None` for [`Category::Exempt`], which has no policy.
    pub fn policy(&self, category: Category) -> Option<CategoryPolicy> {
        let base = default_policy(category)?;
        Some(match self.policies.get(&category) {
            Some(o) => base.apply(o),
            None => base,
        })
    }

    /// Effective policies for every rate-limited category
    pub fn resolved_policies(&self) -> HashMap<Category, CategoryPolicy> {
        Category::ALL
            .iter()
            .filter_map(|c| self.policy(*c).map(|p| (*c, p)))
            .collect()
    }
}

/// Rate limiting strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategy {
    /// Whole capacity restored at each window boundary
    #[default]
    FixedWindow,
    /// Tokens trickle back continuously at `capacity / window` per second
    TokenBucket,
}

/// Which HTTP methods a category's limit applies to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MethodFilter {
    /// Every method
    #[default]
    Any,
    /// POST, PUT, PATCH and DELETE only; reads fall through to later rules
    Write,
}

impl MethodFilter {
    /// `method` must already be upper case
    pub fn accepts(&self, method: &str) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Write => matches!(method, "POST" | "PUT" | "PATCH" | "DELETE"),
        }
    }
}

/// How a denied request is answered
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStyle {
    /// 429 with a JSON body and rate limit headers
    #[default]
    Json,
    /// Redirect back to the same path with `?ratelimit=1`, for HTML form posts
    Redirect,
}

/// Effective limit for one category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Requests admitted per window
    pub capacity: u32,
    /// Window length in seconds
    pub window_secs: u64,
    #[serde(default)]
    pub methods: MethodFilter,
    #[serde(default)]
    pub rejection: RejectionStyle,
}

impl CategoryPolicy {
    pub const fn new(
        capacity: u32,
        window_secs: u64,
        methods: MethodFilter,
        rejection: RejectionStyle,
    ) -> Self {
        Self {
            capacity,
            window_secs,
            methods,
            rejection,
        }
    }

    fn apply(mut self, o: &PolicyOverride) -> Self {
        if let Some(capacity) = o.capacity {
            self.capacity = capacity;
        }
        if let Some(window_secs) = o.window_secs {
            self.window_secs = window_secs;
        }
        if let Some(methods) = o.methods {
            self.methods = methods;
        }
        if let Some(rejection) = o.rejection {
            self.rejection = rejection;
        }
        self
    }
}

/// Partial policy from the config file; unset fields keep the built-in value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyOverride {
    #[serde(default, alias = "requests")]
    pub capacity: Option<u32>,
    #[serde(default, alias = "window")]
    pub window_secs: Option<u64>,
    #[serde(default)]
    pub methods: Option<MethodFilter>,
    #[serde(default)]
    pub rejection: Option<RejectionStyle>,
}

/// Built-in policy table
pub fn default_policy(category: Category) -> Option<CategoryPolicy> {
    use MethodFilter::{Any, Write};
    use RejectionStyle::{Json, Redirect};

    let policy = match category {
        Category::Login => CategoryPolicy::new(5, 300, Write, Redirect),
        Category::Register => CategoryPolicy::new(2, 300, Write, Redirect),
        Category::PasswordReset => CategoryPolicy::new(3, 300, Write, Redirect),
        Category::Booking => CategoryPolicy::new(10, 60, Write, Redirect),
        Category::Chat => CategoryPolicy::new(30, 60, Any, Json),
        Category::Review => CategoryPolicy::new(3, 300, Write, Redirect),
        Category::FileUpload => CategoryPolicy::new(10, 60, Write, Json),
        Category::Payment => CategoryPolicy::new(10, 60, Write, Json),
        Category::Search => CategoryPolicy::new(60, 60, Any, Json),
        Category::Profile => CategoryPolicy::new(30, 60, Any, Json),
        Category::Notification => CategoryPolicy::new(60, 60, Any, Json),
        Category::Restaurant => CategoryPolicy::new(60, 60, Any, Json),
        Category::Customer => CategoryPolicy::new(60, 60, Any, Json),
        Category::Admin => CategoryPolicy::new(100, 60, Any, Json),
        Category::Report => CategoryPolicy::new(10, 300, Any, Json),
        Category::Voucher => CategoryPolicy::new(20, 60, Any, Json),
        Category::Waitlist => CategoryPolicy::new(20, 60, Any, Json),
        Category::Table => CategoryPolicy::new(30, 60, Any, Json),
        Category::Menu => CategoryPolicy::new(60, 60, Any, Json),
        Category::Reservation => CategoryPolicy::new(20, 60, Any, Json),
        Category::Feedback => CategoryPolicy::new(5, 300, Write, Json),
        Category::Support => CategoryPolicy::new(10, 300, Write, Json),
        Category::Analytics => CategoryPolicy::new(30, 60, Any, Json),
        Category::Settings => CategoryPolicy::new(20, 60, Any, Json),
        Category::Dashboard => CategoryPolicy::new(60, 60, Any, Json),
        Category::Api => CategoryPolicy::new(100, 60, Any, Json),
        Category::General => CategoryPolicy::new(100, 60, Any, Json),
        Category::Exempt => return None,
    };
    Some(policy)
}

/// Idle bucket eviction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// A bucket untouched for `idle_multiplier * window` is dropped
    #[serde(default = "default_idle_multiplier")]
    pub idle_multiplier: u32,
    /// Period of the background sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Store size that triggers an inline sweep
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            idle_multiplier: default_idle_multiplier(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_buckets: default_max_buckets(),
        }
    }
}

/// Automatic permanent blocking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBlockConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Denials after which an address is blocked permanently
    #[serde(default = "default_auto_block_threshold")]
    pub threshold: u32,
}

impl Default for AutoBlockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_auto_block_threshold(),
        }
    }
}

/// Monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Blocked requests remembered per address
    #[serde(default = "default_history_per_ip")]
    pub history_per_ip: usize,
    #[serde(default = "default_alert_warning_threshold")]
    pub alert_warning_threshold: u32,
    #[serde(default = "default_alert_danger_threshold")]
    pub alert_danger_threshold: u32,
    /// History, statistics and alerts older than this are dropped by the retention sweep
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Upper bound on addresses with recorded activity
    #[serde(default = "default_max_tracked_ips")]
    pub max_tracked_ips: usize,
    /// Period of the retention sweep
    #[serde(default = "default_retention_interval_secs")]
    pub retention_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_per_ip: default_history_per_ip(),
            alert_warning_threshold: default_alert_warning_threshold(),
            alert_danger_threshold: default_alert_danger_threshold(),
            retention_days: default_retention_days(),
            max_tracked_ips: default_max_tracked_ips(),
            retention_interval_secs: default_retention_interval_secs(),
        }
    }
}
