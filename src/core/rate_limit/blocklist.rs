//! Permanent IP block list

use super::normalize_ip;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A permanently blocked address. Records are deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedIp {
    pub ip: String,
    pub reason: String,
    pub blocked_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub blocked_at: DateTime<Utc>,
    pub active: bool,
}

impl BlockedIp {
    pub fn new(ip: impl Into<String>, reason: impl Into<String>, blocked_by: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            reason: reason.into(),
            blocked_by: blocked_by.into(),
            notes: None,
            blocked_at: Utc::now(),
            active: true,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Storage for permanent blocks
pub trait IpBlocklist: Send + Sync {
    fn is_blocked(&self, ip: &str) -> Result<bool>;

    /// Insert or reactivate a block, replacing any previous record
    fn block(&self, record: BlockedIp) -> Result<()>;

    /// Deactivate a block; `false` when there was no active block
    fn unblock(&self, ip: &str) -> Result<bool>;

    /// Deactivate every active block, returning how many were lifted
    fn unblock_all(&self) -> Result<usize>;

    /// Replace the reason of an active block; `false` when there is none
    fn update_reason(&self, ip: &str, reason: &str) -> Result<bool>;

    /// Active blocks, newest first
    fn active(&self) -> Result<Vec<BlockedIp>>;

    fn get(&self, ip: &str) -> Result<Option<BlockedIp>>;
}

/// Process-local block list
#[derive(Debug, Default)]
pub struct InMemoryBlocklist {
    records: DashMap<String, BlockedIp>,
}

impl InMemoryBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from addresses listed in configuration
    pub fn from_config(ips: &[String]) -> Self {
        let list = Self::new();
        for ip in ips {
            let ip = normalize_ip(ip);
            list.records.insert(
                ip.clone(),
                BlockedIp::new(ip, "Listed in configuration", "config"),
            );
        }
        list
    }
}

impl IpBlocklist for InMemoryBlocklist {
    fn is_blocked(&self, ip: &str) -> Result<bool> {
        Ok(self.records.get(ip).is_some_and(|r| r.active))
    }

    fn block(&self, record: BlockedIp) -> Result<()> {
        self.records.insert(record.ip.clone(), record);
        Ok(())
    }

    fn unblock(&self, ip: &str) -> Result<bool> {
        Ok(match self.records.get_mut(ip) {
            Some(mut record) if record.active => {
                record.active = false;
                true
            }
            _ => false,
        })
    }

    fn unblock_all(&self) -> Result<usize> {
        let mut lifted = 0;
        for mut record in self.records.iter_mut() {
            if record.active {
                record.active = false;
                lifted += 1;
            }
        }
        Ok(lifted)
    }

    fn update_reason(&self, ip: &str, reason: &str) -> Result<bool> {
        Ok(match self.records.get_mut(ip) {
            Some(mut record) if record.active => {
                record.reason = reason.to_string();
                true
            }
            _ => false,
        })
    }

    fn active(&self) -> Result<Vec<BlockedIp>> {
        let mut active: Vec<BlockedIp> = self
            .records
            .iter()
            .filter(|r| r.active)
            .map(|r| r.value().clone())
            .collect();
        active.sort_by(|a, b| b.blocked_at.cmp(&a.blocked_at).then_with(|| a.ip.cmp(&b.ip)));
        Ok(active)
    }

    fn get(&self, ip: &str) -> Result<Option<BlockedIp>> {
        Ok(self.records.get(ip).map(|r| r.value().clone()))
    }
}
