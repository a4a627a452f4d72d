//! Per-request admission decision, independent of the HTTP framework

use super::{Category, Decision, EndpointClassifier, IpBlocklist, RateLimiter};
use crate::config::models::{RateLimitConfig, RejectionStyle};
use std::sync::Arc;
use tracing::error;

/// What the admission layer needs to know about a request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub path: String,
    pub method: String,
    pub client_ip: String,
    pub user_agent: Option<String>,
    /// Caller expects a machine-readable answer (AJAX or API client)
    pub wants_json: bool,
}

impl RequestInfo {
    pub fn new(
        path: impl Into<String>,
        method: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            method: method.into(),
            client_ip: client_ip.into(),
            user_agent: None,
            wants_json: false,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_wants_json(mut self, wants_json: bool) -> Self {
        self.wants_json = wants_json;
        self
    }
}

/// Outcome of admission control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Pass the request on. `decision` is absent when no bucket was consulted.
    Forward {
        category: Category,
        decision: Option<Decision>,
    },
    /// Address is on the permanent block list
    Blocked { category: Category },
    /// Bucket is empty
    Throttled {
        decision: Decision,
        style: RejectionStyle,
    },
}

impl Admission {
    pub fn category(&self) -> Category {
        match self {
            Admission::Forward { category, .. } | Admission::Blocked { category } => *category,
            Admission::Throttled { decision, .. } => decision.category,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Admission::Forward { .. })
    }
}

/// Classify, check the block list, then consume from the bucket.
///
/// Failures of either the block list or the bucket store let the request
/// through and are logged at `error`.
pub struct AdmissionControl {
    classifier: EndpointClassifier,
    limiter: Arc<RateLimiter>,
    blocklist: Arc<dyn IpBlocklist>,
    enabled: bool,
}

impl AdmissionControl {
    pub fn new(
        config: &RateLimitConfig,
        limiter: Arc<RateLimiter>,
        blocklist: Arc<dyn IpBlocklist>,
    ) -> Self {
        Self {
            classifier: EndpointClassifier::from_config(config),
            limiter,
            blocklist,
            enabled: config.enabled,
        }
    }

    pub fn classifier(&self) -> &EndpointClassifier {
        &self.classifier
    }

    pub fn evaluate(&self, request: &RequestInfo) -> Admission {
        let category = self.classifier.classify(&request.path, &request.method);
        if category.is_exempt() {
            return Admission::Forward {
                category,
                decision: None,
            };
        }

        match self.blocklist.is_blocked(&request.client_ip) {
            Ok(true) => return Admission::Blocked { category },
            Ok(false) => {}
            Err(e) => error!(
                "Block list lookup failed for {}, allowing request: {}",
                request.client_ip, e
            ),
        }

        if !self.enabled {
            return Admission::Forward {
                category,
                decision: None,
            };
        }

        let decision = match self.limiter.try_consume(&request.client_ip, category) {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    "Rate limit evaluation failed for {} on {}, allowing request: {}",
                    request.client_ip, request.path, e
                );
                return Admission::Forward {
                    category,
                    decision: None,
                };
            }
        };

        if decision.allowed {
            return Admission::Forward {
                category,
                decision: Some(decision),
            };
        }

        let style = match self.limiter.policy(category).map(|p| p.rejection) {
            Some(RejectionStyle::Redirect) if !request.wants_json => RejectionStyle::Redirect,
            _ => RejectionStyle::Json,
        };
        Admission::Throttled { decision, style }
    }
}
