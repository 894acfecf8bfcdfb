//! `score(assignee) -> WorkloadSnapshot` with a bounded-staleness cache
//! (§4.3: default 5 minutes).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::scoring::{classify_risk, recommendations_for, risk_score, ScoringConfig};
use crate::source::WorkloadSource;
use crate::types::WorkloadSnapshot;

pub const DEFAULT_STALENESS: Duration = Duration::from_secs(300);

struct CacheEntry {
    snapshot: WorkloadSnapshot,
    computed_at: DateTime<Utc>,
}

pub struct WorkloadAnalyzer {
    source: Box<dyn WorkloadSource>,
    config: ScoringConfig,
    staleness: chrono::Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl WorkloadAnalyzer {
    pub fn new(source: Box<dyn WorkloadSource>) -> Self {
        Self::with_config(source, ScoringConfig::default(), DEFAULT_STALENESS)
    }

    pub fn with_config(source: Box<dyn WorkloadSource>, config: ScoringConfig, staleness: Duration) -> Self {
        Self {
            source,
            config,
            staleness: chrono::Duration::from_std(staleness).unwrap_or(chrono::Duration::seconds(300)),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a cached snapshot if it is fresher than the staleness
    /// bound, otherwise recomputes and caches.
    pub fn score(&self, assignee: &str, now: DateTime<Utc>) -> WorkloadSnapshot {
        let mut cache = self.cache.lock().unwrap();
        if let Some(entry) = cache.get(assignee) {
            if now - entry.computed_at < self.staleness {
                return entry.snapshot.clone();
            }
        }

        let inputs = self.source.inputs_for(assignee);
        let score = risk_score(&inputs, &self.config);
        let risk = classify_risk(score, &self.config.thresholds);
        let snapshot = WorkloadSnapshot {
            assignee: assignee.to_string(),
            open_count: inputs.open_count,
            story_points_open: inputs.story_points_open,
            overdue_count: inputs.overdue_count,
            high_priority_open: inputs.high_priority_open_count,
            capacity_utilization: inputs.capacity_utilization,
            risk,
            recommendations: recommendations_for(risk, &inputs),
            as_of: now,
        };

        cache.insert(assignee.to_string(), CacheEntry { snapshot: snapshot.clone(), computed_at: now });
        snapshot
    }

    pub fn invalidate(&self, assignee: &str) {
        self.cache.lock().unwrap().remove(assignee);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkloadInputs;

    struct FixedSource(WorkloadInputs);
    impl WorkloadSource for FixedSource {
        fn inputs_for(&self, _assignee: &str) -> WorkloadInputs {
            self.0
        }
    }

    #[test]
    fn score_is_cached_within_staleness_window() {
        let analyzer = WorkloadAnalyzer::with_config(
            Box::new(FixedSource(WorkloadInputs { open_count: 1, ..Default::default() })),
            ScoringConfig::default(),
            Duration::from_secs(300),
        );
        let now = Utc::now();
        let first = analyzer.score("alice", now);
        // Even though nothing changed, a second call within the window
        // must return the identical cached `as_of`.
        let second = analyzer.score("alice", now + chrono::Duration::seconds(10));
        assert_eq!(first.as_of, second.as_of);
    }

    #[test]
    fn score_recomputes_after_staleness_window() {
        let analyzer = WorkloadAnalyzer::with_config(
            Box::new(FixedSource(WorkloadInputs::default())),
            ScoringConfig::default(),
            Duration::from_secs(60),
        );
        let now = Utc::now();
        let first = analyzer.score("alice", now);
        let second = analyzer.score("alice", now + chrono::Duration::seconds(120));
        assert!(second.as_of > first.as_of);
    }
}
