//! Dedup store entry shape (§3 DedupEntry).

use chrono::{DateTime, Utc};

/// The logical dedup key: the tuple, not the raw `content_hash` alone,
/// identifies semantic content (§4.2 false-positive guard — a
/// colliding hash with a different `(source, subject_key)` is a
/// distinct entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub source: broker_core::EventSource,
    pub subject_key: Option<String>,
    pub content_hash: String,
}

#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub key: DedupKey,
    pub similarity_hash: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub count: u64,
    pub originating_event_id: String,
    pub kind_category: String,
    pub expires_at: DateTime<Utc>,
    /// Set when a later event on the same `(source, subject_key)`
    /// arrived with a different `content_hash`, superseding this
    /// entry (§4.2 update-vs-duplicate distinction).
    pub superseded: bool,
}
