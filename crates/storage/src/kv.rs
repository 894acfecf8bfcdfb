//! Abstract key-value storage boundary: TTL-aware single-key ops plus
//! an atomic batch apply standing in for "simple transactions" (§9
//! Non-goals excludes a concrete cloud backend; the trait is what the
//! scheduler and execution log depend on).

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageError;

#[derive(Debug, Clone)]
pub enum TxOp {
    Put { key: String, value: Vec<u8>, ttl: Option<Duration> },
    Delete { key: String },
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Insert only if `key` is absent or expired; returns the existing
    /// value if one was already present.
    async fn insert_or_fetch(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Apply every op or none of them.
    async fn apply_transaction(&self, ops: Vec<TxOp>) -> Result<(), StorageError>;
}
