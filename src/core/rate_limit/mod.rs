//! Endpoint-classified rate limiting
//!
//! Requests are classified into a [`Category`], keyed by client address and
//! evaluated against that category's bucket. Permanently blocked addresses
//! are rejected before any bucket is touched.

mod admission;
mod blocklist;
mod bucket;
mod category;
mod classifier;
mod client_ip;
mod clock;
mod limiter;
mod monitor;
mod store;


pub use admission::{Admission, AdmissionControl, RequestInfo};
pub use blocklist::{BlockedIp, InMemoryBlocklist, IpBlocklist};
pub use bucket::{Bucket, BucketKey, BucketState};
pub use category::Category;
pub use classifier::{EndpointClassifier, Matcher, Rule};
pub use client_ip::{UNKNOWN_CLIENT, normalize_ip, resolve_client_ip};
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Decision, RateLimiter};
pub use monitor::{
    Alert, AlertKind, AlertLevel, BlockedRequest, BucketInfo, CleanupReport, IpStatistics,
    OverallStatistics, RateLimitMonitor, RequestCounters, ResetAllReport, RiskLevel,
    ThreatIntelligence,
};
pub use store::{BucketStore, InMemoryBucketStore};
