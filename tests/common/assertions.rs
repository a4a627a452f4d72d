//! Custom test assertions
//!
//! Domain-specific assertions on admission gate responses.

use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;

/// Assertions on rate limit headers
pub trait RateLimitAssertions {
    fn header_str(&self, name: &str) -> Option<&str>;

    /// Assert `X-RateLimit-Remaining`
    fn assert_remaining(&self, expected: u32) {
        assert_eq!(
            self.header_str("x-ratelimit-remaining"),
            Some(expected.to_string().as_str()),
            "unexpected X-RateLimit-Remaining"
        );
    }

    /// Assert `X-RateLimit-Limit`
    fn assert_limit(&self, expected: u32) {
        assert_eq!(
            self.header_str("x-ratelimit-limit"),
            Some(expected.to_string().as_str()),
            "unexpected X-RateLimit-Limit"
        );
    }

    /// Assert no rate limit headers were added
    fn assert_not_evaluated(&self) {
        assert!(
            self.header_str("x-ratelimit-limit").is_none(),
            "expected request to bypass rate limiting"
        );
    }

    /// Assert a `Retry-After` within `1..=max_secs`
    fn assert_retry_after_within(&self, max_secs: u64) {
        let retry: u64 = self
            .header_str("retry-after")
            .expect("Retry-After header missing")
            .parse()
            .expect("Retry-After is not a number");
        assert!(
            (1..=max_secs).contains(&retry),
            "Retry-After {} outside 1..={}",
            retry,
            max_secs
        );
    }
}

impl<B> RateLimitAssertions for ServiceResponse<B> {
    fn header_str(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }
}

/// Assert the response status
pub fn assert_status<B>(res: &ServiceResponse<B>, expected: StatusCode) {
    assert_eq!(
        res.status(),
        expected,
        "unexpected status for {}",
        res.request().path()
    );
}
