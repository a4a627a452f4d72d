//! Blocked request monitoring, alerting and operator reset
//!
//! The monitor keeps a bounded history of denied requests per address,
//! raises alerts as an address crosses the configured thresholds and can
//! optionally promote repeat offenders to the permanent block list.
//! Everything it tracks is bounded: per-address history by
//! `history_per_ip`, addresses by `max_tracked_ips`, and age by the
//! retention sweep.

use super::{BlockedIp, Category, IpBlocklist, RateLimiter};
use crate::config::models::{AutoBlockConfig, MonitorConfig};
use crate::utils::error::Result;
use crate::utils::truncate_string;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Oldest alerts are discarded beyond this count
const MAX_ALERTS: usize = 1000;

/// Stored user agents are cut to this many characters
const MAX_USER_AGENT_LEN: usize = 256;

/// Recorded on the block list for automatic blocks
pub const SYSTEM_BLOCKER: &str = "SYSTEM";

/// Risk score ceiling
const MAX_RISK_SCORE: u32 = 100;

/// A request that was denied by the admission gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedRequest {
    pub ip: String,
    pub path: String,
    pub user_agent: Option<String>,
    pub category: Category,
    pub blocked_at: DateTime<Utc>,
}

/// Denial counters for one address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpStatistics {
    pub ip: String,
    pub blocked_count: u64,
    pub first_blocked_at: DateTime<Utc>,
    pub last_blocked_at: DateTime<Utc>,
    pub last_path: String,
    pub categories: BTreeMap<Category, u64>,
}

/// Admission outcomes seen for one address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCounters {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_request_at: DateTime<Utc>,
}

impl RequestCounters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            first_seen_at: now,
            last_request_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => Self::High,
            50.. => Self::Medium,
            20.. => Self::Low,
            _ => Self::Minimal,
        }
    }
}

/// Risk assessment of one address
#[derive(Debug, Clone, Serialize)]
pub struct ThreatIntelligence {
    pub ip: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Percent, one decimal
    pub success_rate: f64,
    pub failure_rate: f64,
    pub blocked_count: u64,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub suspicious: bool,
    pub permanently_blocked: bool,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_request_at: Option<DateTime<Utc>>,
    pub categories: BTreeMap<Category, u64>,
}

impl ThreatIntelligence {
    fn assess(
        ip: &str,
        counters: Option<RequestCounters>,
        stats: Option<IpStatistics>,
        permanently_blocked: bool,
        now: DateTime<Utc>,
    ) -> Self {
        let (total, successful, failed) = counters
            .as_ref()
            .map(|c| (c.total_requests, c.successful_requests, c.failed_requests))
            .unwrap_or_default();
        let blocked_count = stats.as_ref().map(|s| s.blocked_count).unwrap_or(0);
        let last_request_at = counters.as_ref().map(|c| c.last_request_at);
        let since_last = last_request_at.map(|at| now.signed_duration_since(at));

        let success_rate = percent(successful, total);
        let failure_rate = percent(failed, total);

        let burst = since_last.is_some_and(|d| d <= ChronoDuration::minutes(1)) && total > 50;
        let flagged = blocked_count >= 5 || failure_rate > 70.0 || burst;

        let mut score = blocked_count.saturating_mul(10).min(u64::from(MAX_RISK_SCORE)) as u32;
        if failure_rate > 50.0 {
            score += 20;
        }
        if failure_rate > 80.0 {
            score += 30;
        }
        if flagged {
            score += 25;
        }
        if since_last.is_some_and(|d| d <= ChronoDuration::minutes(5)) {
            score += 5;
        }
        let risk_score = score.min(MAX_RISK_SCORE);

        Self {
            ip: ip.to_string(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            success_rate,
            failure_rate,
            blocked_count,
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            suspicious: flagged || risk_score >= 60,
            permanently_blocked,
            first_seen_at: counters.as_ref().map(|c| c.first_seen_at),
            last_request_at,
            categories: stats.map(|s| s.categories).unwrap_or_default(),
        }
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    HighFrequencyBlock,
    SuspiciousActivity,
    PermanentBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Danger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub ip: String,
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Live view of one bucket for operators
#[derive(Debug, Clone, Serialize)]
pub struct BucketInfo {
    pub category: Category,
    pub capacity: u32,
    pub remaining: u32,
    pub window_secs: u64,
    pub reset_after_secs: u64,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStatistics {
    pub total_blocked_requests: u64,
    pub unique_blocked_ips: usize,
    pub tracked_ips: usize,
    pub active_alerts: usize,
    pub permanently_blocked_ips: usize,
    pub tracked_buckets: usize,
    pub blocked_by_category: BTreeMap<Category, u64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub requests_removed: usize,
    pub ips_removed: usize,
    pub alerts_removed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetAllReport {
    pub buckets_reset: usize,
    pub ips_reset: usize,
    pub alerts_cleared: usize,
}

/// Monitoring and reset service over the limiter and block list
pub struct RateLimitMonitor {
    limiter: Arc<RateLimiter>,
    blocklist: Arc<dyn IpBlocklist>,
    config: MonitorConfig,
    auto_block: AutoBlockConfig,
    history: DashMap<String, VecDeque<BlockedRequest>>,
    stats: DashMap<String, IpStatistics>,
    traffic: DashMap<String, RequestCounters>,
    alerts: RwLock<VecDeque<Alert>>,
}

impl RateLimitMonitor {
    pub fn new(
        limiter: Arc<RateLimiter>,
        blocklist: Arc<dyn IpBlocklist>,
        config: MonitorConfig,
        auto_block: AutoBlockConfig,
    ) -> Self {
        Self {
            limiter,
            blocklist,
            config,
            auto_block,
            history: DashMap::new(),
            stats: DashMap::new(),
            traffic: DashMap::new(),
            alerts: RwLock::new(VecDeque::new()),
        }
    }

    /// Count a request the gate let through
    pub fn record_allowed(&self, ip: &str) {
        let now = Utc::now();
        self.make_room_for(ip);
        let mut counters = self
            .traffic
            .entry(ip.to_string())
            .or_insert_with(|| RequestCounters::new(now));
        counters.total_requests += 1;
        counters.successful_requests += 1;
        counters.last_request_at = now;
    }

    /// Record a denied request and react to the address's new denial count
    pub fn record_blocked(
        &self,
        ip: &str,
        path: &str,
        user_agent: Option<&str>,
        category: Category,
    ) -> Result<()> {
        let now = Utc::now();
        self.make_room_for(ip);

        {
            let mut counters = self
                .traffic
                .entry(ip.to_string())
                .or_insert_with(|| RequestCounters::new(now));
            counters.total_requests += 1;
            counters.failed_requests += 1;
            counters.last_request_at = now;
        }

        {
            let mut history = self.history.entry(ip.to_string()).or_default();
            history.push_back(BlockedRequest {
                ip: ip.to_string(),
                path: path.to_string(),
                user_agent: user_agent.map(|ua| truncate_string(ua, MAX_USER_AGENT_LEN)),
                category,
                blocked_at: now,
            });
            while history.len() > self.config.history_per_ip {
                history.pop_front();
            }
        }

        let count = {
            let mut stats = self
                .stats
                .entry(ip.to_string())
                .or_insert_with(|| IpStatistics {
                    ip: ip.to_string(),
                    blocked_count: 0,
                    first_blocked_at: now,
                    last_blocked_at: now,
                    last_path: String::new(),
                    categories: BTreeMap::new(),
                });
            stats.blocked_count += 1;
            stats.last_blocked_at = now;
            stats.last_path = path.to_string();
            *stats.categories.entry(category).or_insert(0) += 1;
            stats.blocked_count
        };

        // each count is produced once, so equality fires each alert exactly once
        if count == u64::from(self.config.alert_warning_threshold) {
            self.push_alert(
                ip,
                AlertKind::HighFrequencyBlock,
                AlertLevel::Warning,
                format!("IP {} has been blocked {} times", ip, count),
            );
        }
        if count == u64::from(self.config.alert_danger_threshold) {
            warn!("Suspicious activity from {}: {} blocked requests", ip, count);
            self.push_alert(
                ip,
                AlertKind::SuspiciousActivity,
                AlertLevel::Danger,
                format!("IP {} has been blocked {} times, last on {}", ip, count, path),
            );
        }
        if self.auto_block.enabled && count == u64::from(self.auto_block.threshold) {
            self.blocklist.block(
                BlockedIp::new(ip, "Automatic block after repeated rate limit violations", SYSTEM_BLOCKER)
                    .with_notes(format!("{} blocked requests", count)),
            )?;
            warn!("Permanently blocked {} after {} blocked requests", ip, count);
            self.push_alert(
                ip,
                AlertKind::PermanentBlock,
                AlertLevel::Danger,
                format!("IP {} was blocked permanently after {} blocked requests", ip, count),
            );
        }

        Ok(())
    }

    /// Trim tracked addresses before a new one is added to a full table
    fn make_room_for(&self, ip: &str) {
        let max = self.config.max_tracked_ips;
        if self.traffic.len() < max || self.traffic.contains_key(ip) {
            return;
        }
        let removed = self.forget_least_recent((max - max / 10).min(max.saturating_sub(1)));
        warn!(
            "Monitoring tracks {} addresses, forgot {} least recently seen",
            max, removed
        );
    }

    /// Forget the least recently seen addresses until at most `keep` remain
    fn forget_least_recent(&self, keep: usize) -> usize {
        let mut seen: Vec<(String, DateTime<Utc>)> = self
            .traffic
            .iter()
            .map(|c| (c.key().clone(), c.last_request_at))
            .collect();
        if seen.len() <= keep {
            return 0;
        }

        seen.sort_by_key(|(_, at)| *at);
        let excess = seen.len() - keep;
        for (ip, _) in seen.iter().take(excess) {
            self.traffic.remove(ip);
            self.stats.remove(ip);
            self.history.remove(ip);
        }
        excess
    }

    fn push_alert(&self, ip: &str, kind: AlertKind, level: AlertLevel, message: String) {
        let mut alerts = self.alerts.write();
        alerts.push_back(Alert {
            ip: ip.to_string(),
            kind,
            level,
            message,
            created_at: Utc::now(),
        });
        while alerts.len() > MAX_ALERTS {
            alerts.pop_front();
        }
    }

    /// Addresses with at least one recorded denial
    pub fn list_blocked_ips(&self) -> Vec<String> {
        let mut ips: Vec<String> = self.stats.iter().map(|s| s.key().clone()).collect();
        ips.sort();
        ips
    }

    /// Addresses with the most denials, highest first
    pub fn top_blocked_ips(&self, n: usize) -> Vec<IpStatistics> {
        let mut all: Vec<IpStatistics> = self.stats.iter().map(|s| s.value().clone()).collect();
        all.sort_by(|a, b| b.blocked_count.cmp(&a.blocked_count).then_with(|| a.ip.cmp(&b.ip)));
        all.truncate(n);
        all
    }

    pub fn ip_statistics(&self, ip: &str) -> Option<IpStatistics> {
        self.stats.get(ip).map(|s| s.value().clone())
    }

    pub fn request_counters(&self, ip: &str) -> Option<RequestCounters> {
        self.traffic.get(ip).map(|c| c.value().clone())
    }

    /// Addresses with any recorded activity
    pub fn tracked_ip_count(&self) -> usize {
        self.traffic.len()
    }

    /// Request outcomes and risk score of the address
    pub fn threat_intelligence(&self, ip: &str) -> Result<ThreatIntelligence> {
        let permanently_blocked = self.blocklist.is_blocked(ip)?;
        Ok(ThreatIntelligence::assess(
            ip,
            self.request_counters(ip),
            self.ip_statistics(ip),
            permanently_blocked,
            Utc::now(),
        ))
    }

    /// Whether the address is currently out of tokens in `category`
    pub fn is_ip_blocked(&self, ip: &str, category: Category) -> Result<bool> {
        if category.is_exempt() {
            return Ok(false);
        }
        Ok(self.limiter.peek(ip, category)?.remaining == 0)
    }

    /// Every bucket the address currently holds
    pub fn bucket_info(&self, ip: &str) -> Result<Vec<BucketInfo>> {
        let mut info = Vec::new();
        for category in Category::ALL {
            let Some(decision) = self.limiter.inspect(ip, category)? else {
                continue;
            };
            let window_secs = self
                .limiter
                .policy(category)
                .map(|p| p.window_secs)
                .unwrap_or_default();
            info.push(BucketInfo {
                category,
                capacity: decision.limit,
                remaining: decision.remaining,
                window_secs,
                reset_after_secs: decision.reset_after_secs,
                blocked: decision.remaining == 0,
            });
        }
        Ok(info)
    }

    /// Restore every bucket of the address and forget its history
    pub fn reset_rate_limit_for_ip(&self, ip: &str) -> Result<usize> {
        let buckets = self.limiter.reset_client(ip)?;
        self.history.remove(ip);
        self.stats.remove(ip);
        self.traffic.remove(ip);
        self.clear_alerts(ip);
        info!("Reset rate limits for {} ({} buckets)", ip, buckets);
        Ok(buckets)
    }

    /// Restore every bucket of every address and forget all recorded activity
    pub fn reset_all_rate_limits(&self) -> Result<ResetAllReport> {
        let buckets_reset = self.limiter.reset_all()?;
        let ips_reset = self.traffic.len().max(self.stats.len());
        self.history.clear();
        self.stats.clear();
        self.traffic.clear();
        let alerts_cleared = {
            let mut alerts = self.alerts.write();
            let count = alerts.len();
            alerts.clear();
            count
        };
        warn!(
            "Reset all rate limits: {} buckets, {} addresses",
            buckets_reset, ips_reset
        );
        Ok(ResetAllReport {
            buckets_reset,
            ips_reset,
            alerts_cleared,
        })
    }

    /// Restore a single category bucket of the address
    pub fn reset_rate_limit_for_category(&self, ip: &str, category: Category) -> Result<bool> {
        let removed = self.limiter.reset(ip, category)?;
        info!("Reset {} rate limit for {}", category, ip);
        Ok(removed)
    }

    pub fn block_ip_permanently(
        &self,
        ip: &str,
        reason: &str,
        blocked_by: &str,
        notes: Option<&str>,
    ) -> Result<BlockedIp> {
        let mut record = BlockedIp::new(ip, reason, blocked_by);
        if let Some(notes) = notes {
            record = record.with_notes(notes);
        }
        self.blocklist.block(record.clone())?;
        warn!("{} permanently blocked {}: {}", blocked_by, ip, reason);
        Ok(record)
    }

    pub fn unblock_ip(&self, ip: &str) -> Result<bool> {
        let unblocked = self.blocklist.unblock(ip)?;
        if unblocked {
            info!("Unblocked {}", ip);
        }
        Ok(unblocked)
    }

    /// Lift every permanent block
    pub fn clear_all_blocks(&self) -> Result<usize> {
        let lifted = self.blocklist.unblock_all()?;
        warn!("Cleared all permanent blocks ({})", lifted);
        Ok(lifted)
    }

    pub fn update_block_reason(&self, ip: &str, reason: &str) -> Result<bool> {
        let updated = self.blocklist.update_reason(ip, reason)?;
        if updated {
            info!("Block reason for {} changed to: {}", ip, reason);
        }
        Ok(updated)
    }

    pub fn permanently_blocked_ips(&self) -> Result<Vec<BlockedIp>> {
        self.blocklist.active()
    }

    /// All alerts, newest first
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().iter().rev().cloned().collect()
    }

    pub fn alerts_for_ip(&self, ip: &str) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .rev()
            .filter(|a| a.ip == ip)
            .cloned()
            .collect()
    }

    pub fn clear_alerts(&self, ip: &str) -> usize {
        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|a| a.ip != ip);
        before - alerts.len()
    }

    /// Denied requests remembered for the address, oldest first
    pub fn blocked_requests_for_ip(&self, ip: &str) -> Vec<BlockedRequest> {
        self.history
            .get(ip)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget history, statistics and alerts older than `days`
    pub fn cleanup_older_than(&self, days: u32) -> CleanupReport {
        let now = Utc::now();
        let cutoff = ChronoDuration::try_days(i64::from(days))
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut report = CleanupReport::default();

        self.history.retain(|_, requests| {
            let before = requests.len();
            requests.retain(|r| r.blocked_at >= cutoff);
            report.requests_removed += before - requests.len();
            !requests.is_empty()
        });

        let before = self.stats.len();
        self.stats.retain(|_, s| s.last_blocked_at >= cutoff);
        report.ips_removed = before.saturating_sub(self.stats.len());
        self.traffic.retain(|_, c| c.last_request_at >= cutoff);

        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|a| a.created_at >= cutoff);
        report.alerts_removed = before - alerts.len();
        drop(alerts);

        info!(
            "Monitoring cleanup: {} requests, {} addresses, {} alerts removed",
            report.requests_removed, report.ips_removed, report.alerts_removed
        );
        report
    }

    /// Apply the retention window and the tracked address bound
    pub fn sweep(&self) -> CleanupReport {
        let mut report = self.cleanup_older_than(self.config.retention_days);
        report.ips_removed += self.forget_least_recent(self.config.max_tracked_ips);
        report
    }

    /// Periodically run the retention sweep
    pub fn start_retention_task(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                let report = monitor.sweep();
                if report != CleanupReport::default() {
                    debug!("Retention sweep removed {:?}", report);
                }
            }
        })
    }

    pub fn overall_statistics(&self) -> Result<OverallStatistics> {
        let mut total = 0u64;
        let mut by_category: BTreeMap<Category, u64> = BTreeMap::new();
        for stats in self.stats.iter() {
            total += stats.blocked_count;
            for (category, count) in &stats.categories {
                *by_category.entry(*category).or_insert(0) += count;
            }
        }

        Ok(OverallStatistics {
            total_blocked_requests: total,
            unique_blocked_ips: self.stats.len(),
            tracked_ips: self.traffic.len(),
            active_alerts: self.alerts.read().len(),
            permanently_blocked_ips: self.blocklist.active()?.len(),
            tracked_buckets: self.limiter.bucket_count()?,
            blocked_by_category: by_category,
            generated_at: Utc::now(),
        })
    }

    /// Snapshot of everything the monitor knows, for download
    pub fn export(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "exported_at": Utc::now(),
            "statistics": self.overall_statistics()?,
            "ip_statistics": self.top_blocked_ips(usize::MAX),
            "permanently_blocked": self.permanently_blocked_ips()?,
            "alerts": self.alerts(),
        }))
    }
}
