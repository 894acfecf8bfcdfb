//! Pipeline decision shape (§3 Decision): the output of routing for
//! one event against one candidate channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Urgency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Immediate,
    Batched,
    Scheduled,
    Suppressed,
    Escalated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub event_id: String,
    pub target_channel: String,
    pub thread_key: Option<String>,
    pub disposition: Disposition,
    pub reason: String,
    pub urgency: Urgency,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub batch_id: Option<String>,
}

impl Decision {
    pub fn immediate(event_id: impl Into<String>, channel: impl Into<String>, urgency: Urgency, reason: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            target_channel: channel.into(),
            thread_key: None,
            disposition: Disposition::Immediate,
            reason: reason.into(),
            urgency,
            scheduled_at: None,
            batch_id: None,
        }
    }
}
