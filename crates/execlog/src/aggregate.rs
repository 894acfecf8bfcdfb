//! Hourly per-hook execution aggregates (§4.7): counts, success/fail
//! split, and duration statistics, built incrementally as executions
//! land. Grounded on the `AuditLog`'s "append, cap, query"
//! shape, generalised from an unbounded FIFO into a rolling summary
//! keyed by the hour the execution started in.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use broker_core::{ExecutionRecord, ExecutionStatus};

/// Truncates a timestamp to its containing hour, formatted so it sorts
/// and serializes cleanly as a row-key component: `2026-08-01T14`.
pub fn hour_bucket(at: DateTime<Utc>) -> String {
    let truncated = at.with_minute(0).unwrap().with_second(0).unwrap().with_nanosecond(0).unwrap();
    truncated.format("%Y-%m-%dT%H").to_string()
}

const MAX_DURATION_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyAggregate {
    pub hook_id: String,
    pub hour: String,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
    pub cancelled: u64,
    pub total_duration_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    /// Bounded reservoir of recent durations, used to estimate p95.
    /// Not exact once `total` exceeds the sample cap, which is
    /// acceptable for a rolling dashboard figure.
    duration_samples: Vec<u64>,
}

impl HourlyAggregate {
    pub fn new(hook_id: impl Into<String>, hour: impl Into<String>) -> Self {
        Self {
            hook_id: hook_id.into(),
            hour: hour.into(),
            total: 0,
            success: 0,
            failure: 0,
            timeout: 0,
            cancelled: 0,
            total_duration_ms: 0,
            min_duration_ms: u64::MAX,
            max_duration_ms: 0,
            duration_samples: Vec::new(),
        }
    }

    /// Rebuilds a bucket from scratch from its raw executions, rather
    /// than folding one record into a possibly-stale running total.
    /// Two calls over the same `executions` produce byte-identical
    /// output, which is what makes a recompute idempotent.
    pub fn from_records(hook_id: impl Into<String>, hour: impl Into<String>, executions: &[ExecutionRecord]) -> Self {
        let mut aggregate = Self::new(hook_id, hour);
        for execution in executions {
            aggregate.record(execution);
        }
        aggregate
    }

    pub fn record(&mut self, execution: &ExecutionRecord) {
        self.total += 1;
        match execution.status {
            ExecutionStatus::Success => self.success += 1,
            ExecutionStatus::Failure => self.failure += 1,
            ExecutionStatus::Timeout => self.timeout += 1,
            ExecutionStatus::Cancelled => self.cancelled += 1,
        }
        self.total_duration_ms += execution.duration_ms;
        self.min_duration_ms = self.min_duration_ms.min(execution.duration_ms);
        self.max_duration_ms = self.max_duration_ms.max(execution.duration_ms);

        if self.duration_samples.len() < MAX_DURATION_SAMPLES {
            self.duration_samples.push(execution.duration_ms);
        } else {
            let idx = (execution.duration_ms as usize) % MAX_DURATION_SAMPLES;
            self.duration_samples[idx] = execution.duration_ms;
        }
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.total as f64
        }
    }

    pub fn p95_duration_ms(&self) -> u64 {
        if self.duration_samples.is_empty() {
            return 0;
        }
        let mut sorted = self.duration_samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * 0.95).round() as usize;
        sorted[idx]
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }

    pub fn throughput_per_minute(&self) -> f64 {
        self.total as f64 / 60.0
    }

    pub fn min_duration_ms(&self) -> u64 {
        if self.min_duration_ms == u64::MAX {
            0
        } else {
            self.min_duration_ms
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ExecutionStatus, duration_ms: u64) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: "e".to_string(),
            hook_id: "hook-1".to_string(),
            event_id: "event-1".to_string(),
            team_id: "team-1".to_string(),
            status,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms,
            delivered: status == ExecutionStatus::Success,
            errors: Vec::new(),
            notes: None,
        }
    }

    #[test]
    fn records_accumulate_counts_and_durations() {
        let mut agg = HourlyAggregate::new("hook-1", "2026-08-01T14");
        agg.record(&record(ExecutionStatus::Success, 100));
        agg.record(&record(ExecutionStatus::Failure, 300));
        agg.record(&record(ExecutionStatus::Success, 200));

        assert_eq!(agg.total, 3);
        assert_eq!(agg.success, 2);
        assert_eq!(agg.failure, 1);
        assert_eq!(agg.min_duration_ms(), 100);
        assert_eq!(agg.max_duration_ms, 300);
        assert!((agg.avg_duration_ms() - 200.0).abs() < f64::EPSILON);
        assert!((agg.success_rate() - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn hour_bucket_truncates_to_the_hour() {
        let at = "2026-08-01T14:37:22Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(hour_bucket(at), "2026-08-01T14");
    }
}
