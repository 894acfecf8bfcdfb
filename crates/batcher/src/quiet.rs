//! Quiet-hours boundary (§4.4: "if current time is within quiet hours
//! for the channel's owning team, non-critical batches are never
//! flushed"). Kept trait-based, same shape as
//! `broker_core::ownership::OwnershipResolver`, so this crate never
//! depends on `broker-config`.

use chrono::{DateTime, Utc};

pub trait QuietHoursGate: Send + Sync {
    /// `Some(quiet_end)` if `channel` is currently within quiet hours,
    /// else `None`.
    fn quiet_until(&self, channel: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

pub struct NeverQuiet;

impl QuietHoursGate for NeverQuiet {
    fn quiet_until(&self, _channel: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        None
    }
}
