//! Persisted scheduled-delivery shape (§4.5 Durability: "persisted
//! through the storage driver as `(scheduled_at, decision)`").

use broker_core::Decision;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ScheduledEntry {
    pub recipient_id: String,
    pub subject_key: Option<String>,
    pub decision: Decision,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingOutcome {
    Immediate,
    Scheduled { scheduled_at: DateTime<Utc> },
    /// A later critical event for the same subject superseded one or
    /// more previously-held digest entries (§4.5 urgent bypass).
    Superseded { removed: usize },
}
