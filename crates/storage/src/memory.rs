//! In-memory reference implementation of `KvStore` and `TabularStore`,
//! used by other crates' tests and by a single-process deployment.
//! Grounded on the `SegmentCache` (`Mutex`-guarded map,
//! lazy-expiry lookups) generalised from a fixed LRU to plain TTL.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::StorageError;
use crate::kv::{KvStore, TxOp};
use crate::tabular::{RowKey, TabularStore};

struct KvEntry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl KvEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}

#[derive(Default)]
pub struct InMemoryKvStore {
    entries: Mutex<std::collections::HashMap<String, KvEntry>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Utc::now();
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).filter(|e| e.is_live(now)).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<std::time::Duration>) -> Result<(), StorageError> {
        let expires_at = ttl.map(|d| Utc::now() + ChronoDuration::from_std(d).unwrap_or(ChronoDuration::zero()));
        self.entries.lock().unwrap().insert(key.to_string(), KvEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn insert_or_fetch(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<std::time::Duration>,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            if existing.is_live(now) {
                return Ok(Some(existing.value.clone()));
            }
        }
        let expires_at = ttl.map(|d| now + ChronoDuration::from_std(d).unwrap_or(ChronoDuration::zero()));
        entries.insert(key.to_string(), KvEntry { value, expires_at });
        Ok(None)
    }

    async fn apply_transaction(&self, ops: Vec<TxOp>) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap();
        for op in ops {
            match op {
                TxOp::Put { key, value, ttl } => {
                    let expires_at = ttl.map(|d| Utc::now() + ChronoDuration::from_std(d).unwrap_or(ChronoDuration::zero()));
                    entries.insert(key, KvEntry { value, expires_at });
                }
                TxOp::Delete { key } => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTabularStore {
    tables: Mutex<std::collections::HashMap<String, BTreeMap<RowKey, Vec<u8>>>>,
}

impl InMemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn put_row(&self, table: &str, key: RowKey, value: Vec<u8>) -> Result<(), StorageError> {
        self.tables.lock().unwrap().entry(table.to_string()).or_default().insert(key, value);
        Ok(())
    }

    async fn get_row(&self, table: &str, key: &RowKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.tables.lock().unwrap().get(table).and_then(|t| t.get(key).cloned()))
    }

    async fn scan_partition(&self, table: &str, partition: &str) -> Result<Vec<(RowKey, Vec<u8>)>, StorageError> {
        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|(k, _)| k.0 == partition)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn delete_row(&self, table: &str, key: &RowKey) -> Result<(), StorageError> {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(table) {
            rows.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = InMemoryKvStore::new();
        store.put("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entry_reads_as_absent() {
        let store = InMemoryKvStore::new();
        store.put("k", b"v".to_vec(), Some(std::time::Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_or_fetch_returns_existing() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.insert_or_fetch("k", b"first".to_vec(), None).await.unwrap(), None);
        assert_eq!(
            store.insert_or_fetch("k", b"second".to_vec(), None).await.unwrap(),
            Some(b"first".to_vec())
        );
    }

    #[tokio::test]
    async fn scan_partition_returns_only_matching_rows() {
        let store = InMemoryTabularStore::new();
        store.put_row("execs", ("hook-a".into(), "2026-08-01T09".into()), b"1".to_vec()).await.unwrap();
        store.put_row("execs", ("hook-a".into(), "2026-08-01T10".into()), b"2".to_vec()).await.unwrap();
        store.put_row("execs", ("hook-b".into(), "2026-08-01T09".into()), b"3".to_vec()).await.unwrap();

        let rows = store.scan_partition("execs", "hook-a").await.unwrap();
        assert_eq!(rows.len(), 2);
    }
}
