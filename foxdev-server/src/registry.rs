//! Dev-server registry
//!
//! The in-memory table of running dev servers, keyed by project id. It is the
//! single source of truth for start/stop/status and is not persisted: after a
//! daemon restart every project reads as idle.

use chrono::{DateTime, Utc};
use foxdev_core::{DevServerInfo, DevServerStatus};
use parking_lot::RwLock;
use std::collections::HashMap;

/// A tracked dev server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerRecord {
    pub project_id: String,
    pub pid: u32,
    pub url: Option<String>,
    pub status: DevServerStatus,
    pub started_at: DateTime<Utc>,
}

impl DevServerRecord {
    pub fn running(project_id: impl Into<String>, pid: u32, url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            pid,
            url: Some(url.into()),
            status: DevServerStatus::Running,
            started_at: Utc::now(),
        }
    }

    pub fn info(&self) -> DevServerInfo {
        DevServerInfo {
            project_id: self.project_id.clone(),
            url: self.url.clone().unwrap_or_default(),
            pid: self.pid,
            status: self.status,
            started_at: self.started_at,
        }
    }
}

/// Project id -> dev server record
///
/// Every method takes the lock for the duration of one map operation only.
#[derive(Debug, Default)]
pub struct DevServerRegistry {
    records: RwLock<HashMap<String, DevServerRecord>>,
}

impl DevServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: &str) -> Option<DevServerRecord> {
        self.records.read().get(project_id).cloned()
    }

    /// Insert or replace the record for `record.project_id`.
    pub fn set(&self, record: DevServerRecord) {
        self.records
            .write()
            .insert(record.project_id.clone(), record);
    }

    /// Remove the record for a project. Deleting a missing key is fine.
    pub fn delete(&self, project_id: &str) -> Option<DevServerRecord> {
        self.records.write().remove(project_id)
    }

    /// Remove the record only if it still refers to `pid`.
    ///
    /// Used by reconciliation so a stale liveness check never evicts a server that was
    /// restarted in the meantime.
    pub fn delete_if_pid(&self, project_id: &str, pid: u32) -> bool {
        let mut records = self.records.write();
        if records.get(project_id).is_some_and(|r| r.pid == pid) {
            records.remove(project_id);
            true
        } else {
            false
        }
    }

    /// All records, sorted by project id.
    pub fn list(&self) -> Vec<DevServerRecord> {
        let mut records: Vec<_> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        records
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
