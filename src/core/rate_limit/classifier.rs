//! Request path classification
//!
//! An ordered rule table maps `(path, method)` to a [`Category`]. The first
//! matching rule wins, so exemptions come first and the generic `/api`
//! fallback comes after every specific `/api/<x>` rule.

use super::Category;
use crate::config::models::{MethodFilter, RateLimitConfig};

/// How a rule inspects the request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// `path == p` or `path` starts with `p/`
    Segment(String),
    Prefix(String),
    Contains(String),
    Suffix(String),
    Exact(String),
}

impl Matcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Segment(p) => path
                .strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/')),
            Matcher::Prefix(p) => path.starts_with(p.as_str()),
            Matcher::Contains(p) => path.contains(p.as_str()),
            Matcher::Suffix(p) => path.ends_with(p.as_str()),
            Matcher::Exact(p) => path == p,
        }
    }
}

/// One entry of the classification table
#[derive(Debug, Clone)]
pub struct Rule {
    pub matcher: Matcher,
    pub category: Category,
    pub methods: MethodFilter,
}

const EXEMPT_PREFIXES: &[&str] = &[
    "/static/",
    "/css/",
    "/js/",
    "/images/",
    "/img/",
    "/fonts/",
    "/uploads/",
    "/actuator/",
];

const EXEMPT_EXACT: &[&str] = &["/favicon.ico", "/robots.txt", "/sitemap.xml", "/health"];

const EXEMPT_SUFFIXES: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".map",
];

/// Path segments per category, in match order. Each is also matched under `/api`.
const SEGMENTS: &[(Category, &[&str])] = &[
    (Category::Login, &["/login", "/auth/login"]),
    (Category::Register, &["/register", "/auth/register"]),
    (
        Category::PasswordReset,
        &[
            "/forgot-password",
            "/reset-password",
            "/auth/forgot-password",
            "/auth/reset-password",
        ],
    ),
    (Category::Booking, &["/booking", "/bookings"]),
    (Category::Chat, &["/chat", "/ws", "/websocket"]),
    (Category::Review, &["/reviews", "/review"]),
    (Category::FileUpload, &["/upload"]),
    (Category::Payment, &["/payment", "/payos"]),
    (Category::Search, &["/search"]),
    (Category::Profile, &["/profile"]),
    (Category::Notification, &["/notifications", "/notification"]),
    (Category::Restaurant, &["/restaurant", "/restaurants"]),
    (Category::Customer, &["/customer"]),
    (Category::Admin, &["/admin"]),
    (Category::Report, &["/report", "/reports"]),
    (Category::Voucher, &["/voucher", "/vouchers"]),
    (Category::Waitlist, &["/waitlist"]),
    (Category::Table, &["/table", "/tables"]),
    (Category::Menu, &["/menu"]),
    (Category::Reservation, &["/reservation", "/reservations"]),
    (Category::Feedback, &["/feedback"]),
    (Category::Support, &["/support"]),
    (Category::Analytics, &["/analytics"]),
    (Category::Settings, &["/settings"]),
    (Category::Dashboard, &["/dashboard"]),
];

/// Maps requests to endpoint categories
#[derive(Debug, Clone)]
pub struct EndpointClassifier {
    rules: Vec<Rule>,
}

impl EndpointClassifier {
    /// Classifier using the built-in method filters
    pub fn new() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }

    /// Classifier whose method filters follow the configured policies
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let methods = |category: Category| {
            config
                .policy(category)
                .map(|p| p.methods)
                .unwrap_or_default()
        };

        let mut rules = Vec::with_capacity(128);
        let mut push = |matcher: Matcher, category: Category, methods: MethodFilter| {
            rules.push(Rule {
                matcher,
                category,
                methods,
            })
        };

        for p in EXEMPT_PREFIXES {
            push(Matcher::Prefix(p.to_string()), Category::Exempt, MethodFilter::Any);
        }
        for p in EXEMPT_EXACT {
            push(Matcher::Exact(p.to_string()), Category::Exempt, MethodFilter::Any);
        }
        for s in EXEMPT_SUFFIXES {
            push(Matcher::Suffix(s.to_string()), Category::Exempt, MethodFilter::Any);
        }

        for (category, segments) in SEGMENTS {
            let filter = methods(*category);
            for segment in *segments {
                push(Matcher::Segment(segment.to_string()), *category, filter);
                push(Matcher::Segment(format!("/api{}", segment)), *category, filter);
            }
            if *category == Category::FileUpload {
                push(Matcher::Contains("/upload".into()), *category, filter);
                push(Matcher::Contains("multipart".into()), *category, MethodFilter::Write);
            }
        }

        push(Matcher::Segment("/api".into()), Category::Api, methods(Category::Api));

        Self { rules }
    }

    /// Classify a request. Unmatched requests are [`Category::General`].
    pub fn classify(&self, path: &str, method: &str) -> Category {
        let method = method.trim().to_ascii_uppercase();
        self.rules
            .iter()
            .find(|rule| rule.methods.accepts(&method) && rule.matcher.matches(path))
            .map(|rule| rule.category)
            .unwrap_or(Category::General)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Default for EndpointClassifier {
    fn default() -> Self {
        Self::new()
    }
}
