//! Append-on-commit audit trail for team config changes (§3, §6
//! `audit(team_id, version, action, actor, at, old, new)`).
//!
//! FIFO-capped per team, the same shape as
//! `stupid-rules::audit_log::AuditLog`'s per-key bound, generalised
//! from rule ids to team ids.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

const MAX_ENTRIES_PER_TEAM: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub team_id: String,
    pub version: u64,
    pub action: String,
    pub actor: String,
    pub at: DateTime<Utc>,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

#[derive(Default)]
pub struct AuditLog {
    entries: Mutex<HashMap<String, VecDeque<AuditRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record: AuditRecord) {
        let mut entries = self.entries.lock().unwrap();
        let bucket = entries.entry(record.team_id.clone()).or_default();
        bucket.push_back(record);
        while bucket.len() > MAX_ENTRIES_PER_TEAM {
            bucket.pop_front();
        }
    }

    pub fn for_team(&self, team_id: &str) -> Vec<AuditRecord> {
        self.entries
            .lock()
            .unwrap()
            .get(team_id)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team: &str, version: u64) -> AuditRecord {
        AuditRecord {
            team_id: team.to_string(),
            version,
            action: "update".to_string(),
            actor: "test".to_string(),
            at: Utc::now(),
            old: None,
            new: None,
        }
    }

    #[test]
    fn records_are_retrievable_per_team() {
        let log = AuditLog::new();
        log.record(record("eng", 1));
        log.record(record("eng", 2));
        log.record(record("platform", 1));

        assert_eq!(log.for_team("eng").len(), 2);
        assert_eq!(log.for_team("platform").len(), 1);
        assert!(log.for_team("ghost").is_empty());
    }

    #[test]
    fn caps_per_team_entries_fifo() {
        let log = AuditLog::new();
        for v in 0..(MAX_ENTRIES_PER_TEAM as u64 + 10) {
            log.record(record("eng", v));
        }
        let entries = log.for_team("eng");
        assert_eq!(entries.len(), MAX_ENTRIES_PER_TEAM);
        assert_eq!(entries.first().unwrap().version, 10);
    }
}
