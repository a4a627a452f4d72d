//! Bucket storage

use super::{Bucket, BucketKey, BucketState, Category};
use crate::config::models::{CategoryPolicy, RateLimitStrategy};
use crate::utils::error::Result;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Storage for rate limit buckets.
///
/// Refill and consume for one key must be a single atomic step. Every
/// method is fallible so a remote implementation can report outages; the
/// admission layer decides what an outage means.
pub trait BucketStore: Send + Sync {
    /// Refill and take one token, creating a full bucket on first use
    fn try_consume(
        &self,
        key: &BucketKey,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> Result<BucketState>;

    /// Current state without consuming; `None` when the bucket does not exist
    fn peek(
        &self,
        key: &BucketKey,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> Result<Option<BucketState>>;

    fn remove(&self, key: &BucketKey) -> Result<bool>;

    /// Remove every bucket of a client, returning how many were dropped
    fn remove_client(&self, client: &str) -> Result<usize>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop buckets not seen within `idle_after(category)` of `now`
    fn evict_idle(&self, now: Instant, idle_after: &dyn Fn(Category) -> Duration) -> Result<usize>;

    /// Drop the least recently seen buckets until at most `keep` remain
    fn evict_oldest(&self, keep: usize) -> Result<usize>;

    /// Drop every bucket, returning how many there were
    fn clear(&self) -> Result<usize>;

    /// Distinct clients holding at least one bucket
    fn clients(&self) -> Result<Vec<String>>;
}

/// Process-local store. The map's entry guard serializes operations on one
/// key while other keys proceed in parallel.
#[derive(Debug, Default)]
pub struct InMemoryBucketStore {
    buckets: DashMap<BucketKey, Bucket>,
}

impl InMemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn try_consume(
        &self,
        key: &BucketKey,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> Result<BucketState> {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            return Ok(bucket.try_take(policy, strategy, now));
        }

        let mut bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::full(policy, now));
        Ok(bucket.try_take(policy, strategy, now))
    }

    fn peek(
        &self,
        key: &BucketKey,
        policy: &CategoryPolicy,
        strategy: RateLimitStrategy,
        now: Instant,
    ) -> Result<Option<BucketState>> {
        Ok(self
            .buckets
            .get(key)
            .map(|bucket| bucket.inspect(policy, strategy, now)))
    }

    fn remove(&self, key: &BucketKey) -> Result<bool> {
        Ok(self.buckets.remove(key).is_some())
    }

    fn remove_client(&self, client: &str) -> Result<usize> {
        let before = self.buckets.len();
        self.buckets.retain(|key, _| key.client != client);
        Ok(before.saturating_sub(self.buckets.len()))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.buckets.len())
    }

    fn evict_idle(&self, now: Instant, idle_after: &dyn Fn(Category) -> Duration) -> Result<usize> {
        let mut evicted = 0;
        self.buckets.retain(|key, bucket| {
            let keep = now.saturating_duration_since(bucket.last_seen()) < idle_after(key.category);
            if !keep {
                evicted += 1;
            }
            keep
        });
        Ok(evicted)
    }

    fn evict_oldest(&self, keep: usize) -> Result<usize> {
        let mut seen: Vec<(BucketKey, Instant)> = self
            .buckets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().last_seen()))
            .collect();
        if seen.len() <= keep {
            return Ok(0);
        }

        seen.sort_by_key(|(_, last_seen)| *last_seen);
        let excess = seen.len() - keep;
        Ok(seen
            .into_iter()
            .take(excess)
            .filter(|(key, _)| self.buckets.remove(key).is_some())
            .count())
    }

    fn clear(&self) -> Result<usize> {
        let before = self.buckets.len();
        self.buckets.clear();
        Ok(before)
    }

    fn clients(&self) -> Result<Vec<String>> {
        let mut clients: Vec<String> = self
            .buckets
            .iter()
            .map(|entry| entry.key().client.clone())
            .collect();
        clients.sort();
        clients.dedup();
        Ok(clients)
    }
}
