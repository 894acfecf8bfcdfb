//! Compound-key tabular storage boundary, used by the execution log
//! for per-`(hook_id, hour)` aggregate rows and per-execution records.

use async_trait::async_trait;

use crate::error::StorageError;

pub type RowKey = (String, String);

#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn put_row(&self, table: &str, key: RowKey, value: Vec<u8>) -> Result<(), StorageError>;

    async fn get_row(&self, table: &str, key: &RowKey) -> Result<Option<Vec<u8>>, StorageError>;

    /// Every row in `table` whose key's first component equals
    /// `partition`, ordered by second component.
    async fn scan_partition(&self, table: &str, partition: &str) -> Result<Vec<(RowKey, Vec<u8>)>, StorageError>;

    async fn delete_row(&self, table: &str, key: &RowKey) -> Result<(), StorageError>;
}
