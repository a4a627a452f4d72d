//! Rate limit evaluation

use super::{BucketKey, BucketState, BucketStore, Category, Clock, InMemoryBucketStore, SystemClock};
use crate::config::models::{CategoryPolicy, EvictionConfig, RateLimitConfig, RateLimitStrategy};
use crate::utils::error::{GatewayError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of evaluating one request against its category's bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub category: Category,
    pub allowed: bool,
    /// Category capacity
    pub limit: u32,
    pub remaining: u32,
    /// 0 when allowed, otherwise `1..=window`
    pub retry_after_secs: u64,
    pub reset_after_secs: u64,
}

impl Decision {
    fn from_state(category: Category, policy: &CategoryPolicy, state: BucketState) -> Self {
        Self {
            category,
            allowed: state.allowed,
            limit: policy.capacity,
            remaining: state.remaining,
            retry_after_secs: state.retry_after_secs,
            reset_after_secs: state.reset_after_secs,
        }
    }

    /// Allow for a category that is never evaluated
    fn exempt() -> Self {
        Self {
            category: Category::Exempt,
            allowed: true,
            limit: 0,
            remaining: 0,
            retry_after_secs: 0,
            reset_after_secs: 0,
        }
    }

    fn full(category: Category, policy: &CategoryPolicy) -> Self {
        Self {
            category,
            allowed: true,
            limit: policy.capacity,
            remaining: policy.capacity,
            retry_after_secs: 0,
            reset_after_secs: 0,
        }
    }
}

/// Per-client, per-category rate limiter
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
    policies: HashMap<Category, CategoryPolicy>,
    strategy: RateLimitStrategy,
    eviction: EvictionConfig,
}

impl RateLimiter {
    /// In-memory limiter on the system clock
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemoryBucketStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: &RateLimitConfig,
        store: Arc<dyn BucketStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            policies: config.resolved_policies(),
            strategy: config.strategy,
            eviction: config.eviction.clone(),
        }
    }

    pub fn policy(&self, category: Category) -> Option<&CategoryPolicy> {
        self.policies.get(&category)
    }

    pub fn strategy(&self) -> RateLimitStrategy {
        self.strategy
    }

    fn require_policy(&self, category: Category) -> Result<&CategoryPolicy> {
        self.policy(category)
            .ok_or_else(|| GatewayError::internal(format!("no policy for category {}", category)))
    }

    /// Take one token from the client's bucket for `category`
    pub fn try_consume(&self, client: &str, category: Category) -> Result<Decision> {
        if category.is_exempt() {
            return Ok(Decision::exempt());
        }

        let policy = self.require_policy(category)?;

        let key = BucketKey::new(client, category);
        let now = self.clock.now();

        if self.store.len()? >= self.eviction.max_buckets
            && self.store.peek(&key, policy, self.strategy, now)?.is_none()
        {
            self.make_room()?;
        }

        let state = self.store.try_consume(&key, policy, self.strategy, now)?;

        if !state.allowed {
            debug!(
                "Rate limit exceeded for {} in {} (retry after {}s)",
                client, category, state.retry_after_secs
            );
        }

        Ok(Decision::from_state(category, policy, state))
    }

    /// Current state without consuming; a client with no bucket reads as full
    pub fn peek(&self, client: &str, category: Category) -> Result<Decision> {
        if category.is_exempt() {
            return Ok(Decision::exempt());
        }
        let policy = self.require_policy(category)?;
        Ok(self
            .inspect(client, category)?
            .unwrap_or_else(|| Decision::full(category, policy)))
    }

    /// Current state of an existing bucket
    pub fn inspect(&self, client: &str, category: Category) -> Result<Option<Decision>> {
        if category.is_exempt() {
            return Ok(None);
        }
        let policy = self.require_policy(category)?;
        let key = BucketKey::new(client, category);
        Ok(self
            .store
            .peek(&key, policy, self.strategy, self.clock.now())?
            .map(|state| Decision::from_state(category, policy, state)))
    }

    /// Restore one bucket to full, e.g. after a successful login
    pub fn reset(&self, client: &str, category: Category) -> Result<bool> {
        self.store.remove(&BucketKey::new(client, category))
    }

    /// Restore every bucket of a client to full
    pub fn reset_client(&self, client: &str) -> Result<usize> {
        self.store.remove_client(client)
    }

    /// Drop buckets idle for longer than `idle_multiplier` windows of their category.
    /// Such a bucket would be full again, so eviction never changes a decision.
    pub fn evict_idle(&self) -> Result<usize> {
        let multiplier = self.eviction.idle_multiplier.max(1);
        let idle_after = |category: Category| {
            let window = self
                .policies
                .get(&category)
                .map(|p| p.window_secs)
                .unwrap_or(0);
            Duration::from_secs(window.saturating_mul(u64::from(multiplier)))
        };
        self.store.evict_idle(self.clock.now(), &idle_after)
    }

    /// Free space for a new bucket once the store is full. Idle buckets go
    /// first; if that is not enough the least recently seen buckets are
    /// dropped down to 90% of `max_buckets`, so the sweep runs once per tenth
    /// of capacity rather than on every new client.
    fn make_room(&self) -> Result<()> {
        let max = self.eviction.max_buckets;
        let idle = self.evict_idle()?;
        if self.store.len()? < max {
            debug!("Bucket store full, evicted {} idle buckets", idle);
            return Ok(());
        }

        let low_watermark = (max - max / 10).min(max.saturating_sub(1));
        let oldest = self.store.evict_oldest(low_watermark)?;
        warn!(
            "Bucket store at {} entries with no idle buckets, evicted {} least recently seen",
            max, oldest
        );
        Ok(())
    }

    /// Restore every bucket of every client to full
    pub fn reset_all(&self) -> Result<usize> {
        self.store.clear()
    }

    pub fn bucket_count(&self) -> Result<usize> {
        self.store.len()
    }

    /// Clients holding at least one bucket
    pub fn clients(&self) -> Result<Vec<String>> {
        self.store.clients()
    }

    /// Periodically evict idle buckets
    pub fn start_eviction_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                match limiter.evict_idle() {
                    Ok(0) => {}
                    Ok(evicted) => debug!("Evicted {} idle rate limit buckets", evicted),
                    Err(e) => warn!("Idle bucket sweep failed: {}", e),
                }
            }
        })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("strategy", &self.strategy)
            .field("categories", &self.policies.len())
            .finish()
    }
}
