//! Versioned, atomically-published team config snapshots (§3, §4.9,
//! §5: "reads are lock-free against the atomically-published active
//! pointer").
//!
//! Reads take a brief `RwLock` read guard only long enough to clone an
//! `Arc`; once cloned, a reader holds an immutable snapshot that a
//! concurrent write can never partially mutate — the read-before-write
//! invariant in §3 holds because publish always swaps in a whole new
//! `Arc<TeamConfig>`, never mutates the one readers may be holding.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::ConfigError;
use crate::types::TeamConfig;

#[derive(Default)]
pub struct SnapshotStore {
    active: RwLock<HashMap<String, Arc<TeamConfig>>>,
    history: RwLock<HashMap<String, Vec<Arc<TeamConfig>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self, team_id: &str) -> Option<Arc<TeamConfig>> {
        self.active.read().unwrap().get(team_id).cloned()
    }

    /// Publish a new snapshot as the active one for its team. Writes
    /// are serialised per-team by callers holding this store behind a
    /// single loader; this method itself is safe to call concurrently
    /// across different teams.
    pub fn publish(&self, config: TeamConfig) -> Arc<TeamConfig> {
        let team_id = config.team_id.clone();
        let snapshot = Arc::new(config);

        {
            let mut history = self.history.write().unwrap();
            history.entry(team_id.clone()).or_default().push(snapshot.clone());
        }
        {
            let mut active = self.active.write().unwrap();
            active.insert(team_id, snapshot.clone());
        }
        snapshot
    }

    pub fn versions(&self, team_id: &str) -> Vec<u64> {
        self.history
            .read()
            .unwrap()
            .get(team_id)
            .map(|snapshots| snapshots.iter().map(|s| s.version).collect())
            .unwrap_or_default()
    }

    pub fn rollback(&self, team_id: &str, version: u64) -> Result<Arc<TeamConfig>, ConfigError> {
        let target = {
            let history = self.history.read().unwrap();
            history
                .get(team_id)
                .and_then(|snapshots| snapshots.iter().find(|s| s.version == version).cloned())
                .ok_or_else(|| ConfigError::TeamNotFound(team_id.to_string()))?
        };
        let mut active = self.active.write().unwrap();
        active.insert(team_id.to_string(), target.clone());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_active_returns_same_snapshot() {
        let store = SnapshotStore::new();
        let config = TeamConfig::new_empty("eng");
        store.publish(config);
        let active = store.active("eng").unwrap();
        assert_eq!(active.team_id, "eng");
    }

    #[test]
    fn rollback_restores_prior_version() {
        let store = SnapshotStore::new();
        let mut v1 = TeamConfig::new_empty("eng");
        v1.version = 1;
        store.publish(v1);

        let mut v2 = TeamConfig::new_empty("eng");
        v2.version = 2;
        v2.escalation_channel = "#v2-escalations".to_string();
        store.publish(v2);

        assert_eq!(store.active("eng").unwrap().version, 2);
        store.rollback("eng", 1).unwrap();
        assert_eq!(store.active("eng").unwrap().version, 1);
    }

    #[test]
    fn unknown_team_read_is_none() {
        let store = SnapshotStore::new();
        assert!(store.active("ghost").is_none());
    }
}
