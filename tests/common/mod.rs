//! Common test utilities for bookgate
//!
//! - Gateway state and request factories
//! - Custom assertions on rate limit headers

pub mod assertions;
pub mod fixtures;

pub use assertions::{RateLimitAssertions, assert_status};
pub use fixtures::{GatewayFactory, RequestFactory};
