//! Execution record shape (§3 ExecutionRecord): the unit L6 emits and
//! L7 stores. Defined here, not in either crate, so neither depends on
//! the other — `broker-engine` wires the channel between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub hook_id: String,
    pub event_id: String,
    pub team_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub delivered: bool,
    pub errors: Vec<String>,
    pub notes: Option<String>,
}
