//! Append-only execution log plus hourly aggregation (§4.7), backed by
//! `broker_storage::TabularStore`. Raw records are written once per
//! execution; the aggregate row for the owning hour is upserted in the
//! same call so dashboards never need to replay the raw log.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use broker_core::ExecutionRecord;
use broker_storage::{StorageError, TabularStore};

use crate::aggregate::{hour_bucket, HourlyAggregate};

const RAW_TABLE: &str = "executions";
const TEAM_INDEX_TABLE: &str = "executions_by_team";
const AGGREGATE_TABLE: &str = "hourly_aggregates";

const DEFAULT_RAW_RETENTION_DAYS: i64 = 30;
const DEFAULT_AGGREGATE_RETENTION_DAYS: i64 = 180;

pub struct ExecutionLog {
    store: Arc<dyn TabularStore>,
    raw_retention: chrono::Duration,
    aggregate_retention: chrono::Duration,
}

impl ExecutionLog {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self {
            store,
            raw_retention: chrono::Duration::days(DEFAULT_RAW_RETENTION_DAYS),
            aggregate_retention: chrono::Duration::days(DEFAULT_AGGREGATE_RETENTION_DAYS),
        }
    }

    /// Writes the raw record and folds it into its hour's aggregate.
    /// Safe to call more than once for the same `execution_id` only if
    /// the caller guarantees exactly-once delivery upstream; this
    /// layer does not deduplicate by id, matching
    /// `stupid-rules::audit_log::AuditLog`'s append-only behavior.
    pub async fn append(&self, record: &ExecutionRecord) -> Result<(), StorageError> {
        let body = serde_json::to_vec(record).map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store
            .put_row(RAW_TABLE, (record.hook_id.clone(), record.execution_id.clone()), body.clone())
            .await?;
        self.store
            .put_row(
                TEAM_INDEX_TABLE,
                (record.team_id.clone(), record.execution_id.clone()),
                body,
            )
            .await?;

        let hour = hour_bucket(record.started_at);
        let key = (record.hook_id.clone(), hour.clone());
        let mut aggregate = match self.store.get_row(AGGREGATE_TABLE, &key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| StorageError::Backend(e.to_string()))?,
            None => HourlyAggregate::new(record.hook_id.clone(), hour),
        };
        aggregate.record(record);
        let encoded = serde_json::to_vec(&aggregate).map_err(|e| StorageError::Backend(e.to_string()))?;
        self.store.put_row(AGGREGATE_TABLE, key, encoded).await
    }

    pub async fn by_hook(&self, hook_id: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ExecutionRecord>, StorageError> {
        let rows = self.store.scan_partition(RAW_TABLE, hook_id).await?;
        decode_and_filter(rows, since)
    }

    pub async fn by_team(&self, team_id: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ExecutionRecord>, StorageError> {
        let rows = self.store.scan_partition(TEAM_INDEX_TABLE, team_id).await?;
        decode_and_filter(rows, since)
    }

    /// Rebuilds every `(hook_id, hour)` bucket touched by executions
    /// started in `[from, to]` directly from the raw `executions`
    /// partition and upserts the result (§4.7: aggregation is
    /// idempotent and re-runnable for any time window). Unlike
    /// `append`'s incremental fold, this never double-counts a replayed
    /// or re-delivered record: each bucket is recomputed from scratch
    /// from its current raw rows before being written back.
    pub async fn aggregate(&self, hook_id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<HourlyAggregate>, StorageError> {
        let mut records = self
            .store
            .scan_partition(RAW_TABLE, hook_id)
            .await?
            .into_iter()
            .map(|(_, bytes)| serde_json::from_slice::<ExecutionRecord>(&bytes).map_err(|e| StorageError::Backend(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        records.retain(|r| r.started_at >= from && r.started_at <= to);
        records.sort_by(|a, b| (a.started_at, &a.execution_id).cmp(&(b.started_at, &b.execution_id)));

        let mut by_hour: std::collections::BTreeMap<String, Vec<ExecutionRecord>> = std::collections::BTreeMap::new();
        for record in records {
            by_hour.entry(hour_bucket(record.started_at)).or_default().push(record);
        }

        let mut rebuilt = Vec::with_capacity(by_hour.len());
        for (hour, bucket_records) in by_hour {
            let aggregate = HourlyAggregate::from_records(hook_id.to_string(), hour.clone(), &bucket_records);
            let encoded = serde_json::to_vec(&aggregate).map_err(|e| StorageError::Backend(e.to_string()))?;
            self.store.put_row(AGGREGATE_TABLE, (hook_id.to_string(), hour), encoded).await?;
            rebuilt.push(aggregate);
        }
        Ok(rebuilt)
    }

    pub async fn hourly_aggregates(&self, hook_id: &str) -> Result<Vec<HourlyAggregate>, StorageError> {
        let rows = self.store.scan_partition(AGGREGATE_TABLE, hook_id).await?;
        rows.into_iter()
            .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(|e| StorageError::Backend(e.to_string())))
            .collect()
    }

    /// Drops raw rows older than the raw retention window and
    /// aggregate rows older than the aggregate retention window, for
    /// one hook's partition. The engine calls this periodically per
    /// known hook rather than on a fixed timer.
    pub async fn sweep_retention(&self, hook_id: &str, now: DateTime<Utc>) -> Result<(), StorageError> {
        for (key, bytes) in self.store.scan_partition(RAW_TABLE, hook_id).await? {
            let record: ExecutionRecord = serde_json::from_slice(&bytes).map_err(|e| StorageError::Backend(e.to_string()))?;
            if now - record.started_at > self.raw_retention {
                self.store.delete_row(RAW_TABLE, &key).await?;
                self.store
                    .delete_row(TEAM_INDEX_TABLE, &(record.team_id, record.execution_id))
                    .await
                    .or_else(|e| match e {
                        StorageError::NotFound(_) => Ok(()),
                        other => Err(other),
                    })?;
            }
        }

        for (key, bytes) in self.store.scan_partition(AGGREGATE_TABLE, hook_id).await? {
            let aggregate: HourlyAggregate = serde_json::from_slice(&bytes).map_err(|e| StorageError::Backend(e.to_string()))?;
            let hour_start = DateTime::parse_from_str(&format!("{}:00:00 +0000", aggregate.hour), "%Y-%m-%dT%H:%M:%S %z")
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            if now - hour_start > self.aggregate_retention {
                self.store.delete_row(AGGREGATE_TABLE, &key).await?;
            }
        }

        Ok(())
    }
}

fn decode_and_filter(
    rows: Vec<((String, String), Vec<u8>)>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<ExecutionRecord>, StorageError> {
    let mut records = rows
        .into_iter()
        .map(|(_, bytes)| serde_json::from_slice::<ExecutionRecord>(&bytes).map_err(|e| StorageError::Backend(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(since) = since {
        records.retain(|r| r.started_at >= since);
    }
    records.sort_by_key(|r| r.started_at);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::ExecutionStatus;
    use broker_storage::InMemoryTabularStore;

    fn record(id: &str, hook: &str, team: &str, started_at: DateTime<Utc>) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: id.to_string(),
            hook_id: hook.to_string(),
            event_id: format!("event-{id}"),
            team_id: team.to_string(),
            status: ExecutionStatus::Success,
            started_at,
            ended_at: started_at,
            duration_ms: 50,
            delivered: true,
            errors: Vec::new(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn append_updates_raw_log_and_aggregate() {
        let store = Arc::new(InMemoryTabularStore::new());
        let log = ExecutionLog::new(store);
        let now = Utc::now();
        log.append(&record("e1", "hook-a", "team-1", now)).await.unwrap();
        log.append(&record("e2", "hook-a", "team-1", now)).await.unwrap();

        let raw = log.by_hook("hook-a", None).await.unwrap();
        assert_eq!(raw.len(), 2);

        let aggregates = log.hourly_aggregates("hook-a").await.unwrap();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].total, 2);
    }

    #[tokio::test]
    async fn by_team_uses_the_team_index() {
        let store = Arc::new(InMemoryTabularStore::new());
        let log = ExecutionLog::new(store);
        let now = Utc::now();
        log.append(&record("e1", "hook-a", "team-1", now)).await.unwrap();
        log.append(&record("e2", "hook-b", "team-1", now)).await.unwrap();
        log.append(&record("e3", "hook-c", "team-2", now)).await.unwrap();

        let team1 = log.by_team("team-1", None).await.unwrap();
        assert_eq!(team1.len(), 2);
    }

    #[tokio::test]
    async fn aggregate_is_idempotent_across_reruns() {
        let store = Arc::new(InMemoryTabularStore::new());
        let log = ExecutionLog::new(store);
        let now = Utc::now();
        log.append(&record("e1", "hook-a", "team-1", now)).await.unwrap();
        log.append(&record("e2", "hook-a", "team-1", now)).await.unwrap();

        let window_start = now - chrono::Duration::hours(1);
        let window_end = now + chrono::Duration::hours(1);
        let first = log.aggregate("hook-a", window_start, window_end).await.unwrap();
        let second = log.aggregate("hook-a", window_start, window_end).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].total, 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].total, first[0].total);
        assert_eq!(second[0].success, first[0].success);
    }

    #[tokio::test]
    async fn aggregate_reconciles_after_a_duplicated_append() {
        let store = Arc::new(InMemoryTabularStore::new());
        let log = ExecutionLog::new(store);
        let now = Utc::now();
        log.append(&record("e1", "hook-a", "team-1", now)).await.unwrap();
        // A redelivered record with the same execution_id overwrites the
        // raw row rather than appending a second one.
        log.append(&record("e1", "hook-a", "team-1", now)).await.unwrap();

        let rebuilt = log
            .aggregate("hook-a", now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0].total, 1);
    }

    #[tokio::test]
    async fn sweep_retention_drops_old_raw_rows() {
        let store = Arc::new(InMemoryTabularStore::new());
        let log = ExecutionLog::new(store);
        let old = Utc::now() - chrono::Duration::days(40);
        log.append(&record("old", "hook-a", "team-1", old)).await.unwrap();
        log.append(&record("new", "hook-a", "team-1", Utc::now())).await.unwrap();

        log.sweep_retention("hook-a", Utc::now()).await.unwrap();
        let raw = log.by_hook("hook-a", None).await.unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].execution_id, "new");
    }
}
