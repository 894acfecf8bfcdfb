#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("transaction conflict on key: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
