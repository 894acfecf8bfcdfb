//! Dead-letter queue: dispatch attempts that exhausted retries and
//! recovery land here for manual replay, with their own retention
//! window separate from the execution log.

use chrono::{DateTime, Utc};

use broker_core::ExecutionRecord;

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub record: ExecutionRecord,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

pub struct DeadLetterQueue {
    entries: Vec<DeadLetter>,
    retention: chrono::Duration,
}

impl DeadLetterQueue {
    pub fn new(retention: chrono::Duration) -> Self {
        Self {
            entries: Vec::new(),
            retention,
        }
    }

    pub fn push(&mut self, record: ExecutionRecord, last_error: String, now: DateTime<Utc>) {
        self.entries.push(DeadLetter {
            record,
            last_error,
            dead_lettered_at: now,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DeadLetter] {
        &self.entries
    }

    /// Drops entries older than the retention window. Run periodically
    /// from the engine's background tick, not on every push.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|e| now - e.dead_lettered_at < self.retention);
    }

    /// Removes and returns an entry for replay (e.g. via the CLI's
    /// `replay` subcommand).
    pub fn take(&mut self, execution_id: &str) -> Option<DeadLetter> {
        let idx = self.entries.iter().position(|e| e.record.execution_id == execution_id)?;
        Some(self.entries.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::ExecutionStatus;

    fn record(id: &str) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.to_string(),
            hook_id: "hook-1".to_string(),
            event_id: "event-1".to_string(),
            team_id: "team-1".to_string(),
            status: ExecutionStatus::Failure,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms: 10,
            delivered: false,
            errors: vec!["boom".to_string()],
            notes: None,
        }
    }

    #[test]
    fn sweep_drops_expired_entries() {
        let mut queue = DeadLetterQueue::new(chrono::Duration::seconds(60));
        let now = Utc::now();
        queue.push(record("a"), "boom".to_string(), now - chrono::Duration::seconds(120));
        queue.push(record("b"), "boom".to_string(), now);
        queue.sweep(now);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.entries()[0].record.execution_id, "b");
    }

    #[test]
    fn take_removes_matching_entry() {
        let mut queue = DeadLetterQueue::new(chrono::Duration::seconds(60));
        queue.push(record("a"), "boom".to_string(), Utc::now());
        let taken = queue.take("a").expect("present");
        assert_eq!(taken.record.execution_id, "a");
        assert!(queue.is_empty());
    }
}
