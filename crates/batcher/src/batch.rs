//! Batch shape (§3 Batch): mutable until flushed, then immutable.

use chrono::{DateTime, Utc};

use broker_core::Decision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    ImmediateArrival,
    SizeCap,
    Deadline,
    BurstCooldown,
    ExplicitFlush,
    Shutdown,
    /// Incoming event fell outside the open batch's similarity
    /// centroid threshold; not one of §4.4's five named flush
    /// triggers, but the natural consequence of opening a new batch.
    Dissimilar,
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: String,
    pub channel: String,
    /// Member decisions, first-added-first (§4.4 invariant).
    pub members: Vec<Decision>,
    pub opened_at: DateTime<Utc>,
    pub last_added_at: DateTime<Utc>,
    pub deadline_at: DateTime<Utc>,
    pub reason: FlushTrigger,
    /// Set once the batch is accepting overflow decisions under a rate
    /// cap, regardless of similarity (§4.4 anti-spam).
    pub overflow: bool,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
