//! Config loading, hot reload, and commit (§4.9).
//!
//! Grounded on `stupid-rules::loader::core`'s shape: a directory scan,
//! a cheap envelope pass to find the document's key before committing
//! to a full parse, a `notify`-backed filesystem watcher with
//! debounce, and an atomic write via a temp file + rename.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audit::{AuditLog, AuditRecord};
use crate::error::ConfigError;
use crate::snapshot::SnapshotStore;
use crate::types::TeamConfig;
use crate::validation::{self, ValidationResult};

/// Minimal envelope used for the first parse pass: just enough to
/// find which team a document belongs to before paying for the full
/// typed deserialize.
#[derive(serde::Deserialize)]
struct Envelope {
    team_id: String,
}

pub struct ConfigLoader {
    teams_dir: PathBuf,
    pub store: Arc<SnapshotStore>,
    pub audit: Arc<AuditLog>,
    reload_tx: broadcast::Sender<String>,
    _watcher: std::sync::Mutex<Option<RecommendedWatcher>>,
}

impl ConfigLoader {
    pub fn new(teams_dir: impl Into<PathBuf>) -> Self {
        let (reload_tx, _rx) = broadcast::channel(64);
        Self {
            teams_dir: teams_dir.into(),
            store: Arc::new(SnapshotStore::new()),
            audit: Arc::new(AuditLog::new()),
            reload_tx,
            _watcher: std::sync::Mutex::new(None),
        }
    }

    /// `subscribe(team_id, fn)`'s Rust shape: callers get a broadcast
    /// receiver and filter by team id themselves.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.reload_tx.subscribe()
    }

    pub fn load(&self, team_id: &str) -> Result<Arc<TeamConfig>, ConfigError> {
        self.store
            .active(team_id)
            .ok_or_else(|| ConfigError::TeamNotFound(team_id.to_string()))
    }

    /// Scan `teams_dir` for `*.yaml`/`*.yml` documents and load each
    /// into the snapshot store. Malformed documents are logged and
    /// skipped rather than aborting the whole scan.
    pub fn load_all(&self) -> Result<usize, ConfigError> {
        let mut loaded = 0;
        for entry in walkdir::WalkDir::new(&self.teams_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            match self.load_file(path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "skipping invalid team config"),
            }
        }
        Ok(loaded)
    }

    fn load_file(&self, path: &Path) -> Result<Arc<TeamConfig>, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        // First pass: cheap envelope parse, just enough to know which
        // team this is before committing to the full document shape.
        let envelope: Envelope = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let config: TeamConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        debug_assert_eq!(envelope.team_id, config.team_id);

        let result = validation::validate(&config);
        if !result.valid() {
            return Err(ConfigError::ValidationFailed(result.errors.len()));
        }

        Ok(self.commit(config, "file-load", "system", result))
    }

    /// Validate and, if valid, publish `patch` as a new active
    /// snapshot with a new version id, retaining the prior snapshot
    /// for rollback, and appending an audit record (§4.9).
    pub fn update(
        &self,
        mut patch: TeamConfig,
        actor: &str,
    ) -> Result<(Arc<TeamConfig>, ValidationResult), ConfigError> {
        let result = validation::validate(&patch);
        if !result.valid() {
            return Ok((
                self.store.active(&patch.team_id).unwrap_or_else(|| {
                    Arc::new(TeamConfig::new_empty(patch.team_id.clone()))
                }),
                result,
            ));
        }

        let next_version = self
            .store
            .active(&patch.team_id)
            .map(|c| c.version + 1)
            .unwrap_or(1);
        patch.version = next_version;

        let snapshot = self.commit(patch, "update", actor, result.clone());
        let _ = self.reload_tx.send(snapshot.team_id.clone());
        Ok((snapshot, result))
    }

    fn commit(
        &self,
        config: TeamConfig,
        action: &str,
        actor: &str,
        _validated: ValidationResult,
    ) -> Arc<TeamConfig> {
        let old = self.store.active(&config.team_id);
        let team_id = config.team_id.clone();
        let version = config.version;
        let new_json = serde_json::to_value(&config).ok();
        let snapshot = self.store.publish(config);

        self.audit.record(AuditRecord {
            team_id,
            version,
            action: action.to_string(),
            actor: actor.to_string(),
            at: chrono::Utc::now(),
            old: old.and_then(|o| serde_json::to_value(&*o).ok()),
            new: new_json,
        });

        snapshot
    }

    /// Atomically persist `config` to `path` via a temp file + rename,
    /// so a crash mid-write never leaves a half-written document for
    /// the watcher to pick up.
    pub fn write_document(&self, path: &Path, config: &TeamConfig) -> Result<(), ConfigError> {
        let serialized = serde_yaml::to_string(config).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let tmp_path = path.with_extension("yaml.tmp");
        std::fs::write(&tmp_path, serialized).map_err(|source| ConfigError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Start watching `teams_dir` for changes, debouncing bursts of
    /// filesystem events into a single reload per settle window.
    pub fn watch(self: &Arc<Self>) -> Result<(), ConfigError> {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let loader_dir = self.teams_dir.clone();

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    let _ = tx.blocking_send(event);
                }
            })
            .map_err(|e| ConfigError::Watch(e.to_string()))?;

        watcher
            .watch(&loader_dir, RecursiveMode::Recursive)
            .map_err(|e| ConfigError::Watch(e.to_string()))?;

        *self._watcher.lock().unwrap() = Some(watcher);

        let loader = self.clone();
        tokio::spawn(async move {
            loop {
                // Wait for the first event, then a short debounce
                // window collecting any further bursts before acting.
                if rx.recv().await.is_none() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
                while rx.try_recv().is_ok() {}

                match loader.load_all() {
                    Ok(n) => info!(reloaded = n, "team config hot-reload complete"),
                    Err(e) => warn!(error = %e, "team config hot-reload failed"),
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_team_yaml(dir: &Path, team_id: &str) {
        let config = TeamConfig::new_empty(team_id);
        let yaml = serde_yaml::to_string(&config).unwrap();
        std::fs::write(dir.join(format!("{team_id}.yaml")), yaml).unwrap();
    }

    #[test]
    fn load_all_picks_up_every_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        write_team_yaml(dir.path(), "eng");
        write_team_yaml(dir.path(), "platform");

        let loader = ConfigLoader::new(dir.path());
        let loaded = loader.load_all().unwrap();
        assert_eq!(loaded, 2);
        assert!(loader.load("eng").is_ok());
        assert!(loader.load("platform").is_ok());
    }

    #[test]
    fn load_all_skips_invalid_documents() {
        let dir = tempfile::tempdir().unwrap();
        write_team_yaml(dir.path(), "eng");
        std::fs::write(dir.path().join("broken.yaml"), "not: [valid, team, config").unwrap();

        let loader = ConfigLoader::new(dir.path());
        let loaded = loader.load_all().unwrap();
        assert_eq!(loaded, 1);
    }

    #[test]
    fn update_rejects_invalid_patch_without_publishing() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let mut bad = TeamConfig::new_empty("eng");
        bad.work_hours.timezone = "Not/A_Zone".to_string();

        let (_, result) = loader.update(bad, "tester").unwrap();
        assert!(!result.valid());
        assert!(loader.load("eng").is_err());
    }

    #[test]
    fn update_bumps_version_and_records_audit() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());

        let v1 = TeamConfig::new_empty("eng");
        loader.update(v1, "tester").unwrap();
        let v2 = TeamConfig::new_empty("eng");
        let (snapshot, result) = loader.update(v2, "tester").unwrap();

        assert!(result.valid());
        assert_eq!(snapshot.version, 2);
        assert_eq!(loader.audit.for_team("eng").len(), 2);
    }
}
