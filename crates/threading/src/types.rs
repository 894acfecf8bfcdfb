//! Inputs and state for thread-key resolution (§4.8).

use chrono::{DateTime, Utc};

/// The subset of an event's fields threading cares about. Kept
/// separate from `broker_core::Event` so this crate doesn't need to
/// depend on the full event/classification shape.
#[derive(Debug, Clone)]
pub struct ThreadInputs {
    pub channel: String,
    pub subject_key: Option<String>,
    pub kind_category: String,
    pub similarity_hash: u64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ThreadState {
    pub thread_key: String,
    pub channel: String,
    pub subject_key: Option<String>,
    pub kind_category: String,
    /// Similarity hash of the thread's founding event; later arrivals
    /// compare against this, not a running centroid, since threading
    /// binds to one topic rather than absorbing drift the way the
    /// batcher's centroid does.
    pub similarity_hash: u64,
    pub last_activity: DateTime<Utc>,
    pub bound_messages: Vec<String>,
}
