//! Per-client, per-category token bucket

use super::Category;
use crate::config::models::{CategoryPolicy, RateLimitStrategy};
use std::time::{Duration, Instant};

/// Identity of one bucket: a client never shares a bucket across categories
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub client: String,
    pub category: Category,
}

impl BucketKey {
    pub fn new(client: impl Into<String>, category: Category) -> Self {
        Self {
            client: client.into(),
            category,
        }
    }
}

/// Outcome of a consume or inspect on a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub allowed: bool,
    /// Whole tokens left after the operation
    pub remaining: u32,
    /// Seconds until the next request can succeed; 0 when allowed
    pub retry_after_secs: u64,
    /// Seconds until the bucket next refills
    pub reset_after_secs: u64,
}

/// Token bucket state
#[derive(Debug, Clone)]
pub struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

impl Bucket {
    /// A new bucket starts full
    pub fn full(policy: &CategoryPolicy, now: Instant) -> Self {
        Self {
            tokens: f64::from(policy.capacity),
            last_refill: now,
            last_seen: now,
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Bring the token count up to date. Tokens never exceed capacity and
    /// never decrease here.
    pub fn refill(&mut self, policy: &CategoryPolicy, strategy: RateLimitStrategy, now: Instant) {
        let capacity = f64::from(policy.capacity);
        let window = window(policy);
        let elapsed = now.saturating_duration_since(self.last_refill);

        match strategy {
            RateLimitStrategy::FixedWindow => {
                if elapsed >= window {
                    let windows = elapsed.as_nanos() / window.as_nanos();
                    let advance = window.as_nanos() * windows;
                    self.last_refill += Duration::from_nanos(advance.min(u64::MAX as u128) as u64);
                    self.tokens = capacity;
                }
            }
            RateLimitStrategy::TokenBucket => {
                let added = elapsed.as_secs_f64() * capacity / window.as_secs_f64();
                self.tokens = (self.tokens + added).min(capacity);
                self.last_refill = now;
            }
        }
    }

    /// Refill, then take one token if available
    pub fn try_take(
        &mut self,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> BucketState {
        self.refill(policy, strategy, now);
        self.last_seen = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.state(true, policy, strategy, now)
        } else {
            self.state(false, policy, strategy, now)
        }
    }

    /// State as of `now` without consuming
    pub fn inspect(
        &self,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> BucketState {
        let mut view = self.clone();
        view.refill(policy, strategy, now);
        let allowed = view.tokens >= 1.0;
        view.state(allowed, policy, strategy, now)
    }

    fn state(
        &self,
        allowed: bool,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> BucketState {
        let reset_after_secs = self.reset_after(policy, strategy, now);
        let retry_after_secs = if allowed {
            0
        } else {
            reset_after_secs.clamp(1, policy.window_secs)
        };

        BucketState {
            allowed,
            remaining: self.tokens.floor().max(0.0) as u32,
            retry_after_secs,
            reset_after_secs,
        }
    }

    fn reset_after(&self, policy: &CategoryPolicy, strategy: RateLimitStrategy, now: Instant) -> u64 {
        let window = window(policy);
        match strategy {
            RateLimitStrategy::FixedWindow => {
                let into_window = now.saturating_duration_since(self.last_refill);
                ceil_secs(window.saturating_sub(into_window))
            }
            RateLimitStrategy::TokenBucket => {
                let missing = 1.0 - self.tokens;
                if missing <= 0.0 {
                    return 0;
                }
                (missing * window.as_secs_f64() / f64::from(policy.capacity)).ceil() as u64
            }
        }
    }
}

fn window(policy: &CategoryPolicy) -> Duration {
    Duration::from_secs(policy.window_secs.max(1))
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}
