//! Workload analyzer types (§3 WorkloadSnapshot, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw signal counts for one assignee, as supplied by a `WorkloadSource`.
/// The analyzer never fetches these itself; it only scores them.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadInputs {
    pub open_count: u32,
    pub story_points_open: f64,
    pub high_priority_open_count: u32,
    pub overdue_count: u32,
    /// Hours of work currently assigned divided by hours of capacity
    /// available this sprint; `1.0` means fully booked.
    pub capacity_utilization: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    Defer,
    Reassign,
    ReducePriorityLoad,
    EscalateToLead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSnapshot {
    pub assignee: String,
    pub open_count: u32,
    pub story_points_open: f64,
    pub overdue_count: u32,
    pub high_priority_open: u32,
    pub capacity_utilization: f64,
    pub risk: RiskLevel,
    pub recommendations: Vec<Recommendation>,
    pub as_of: DateTime<Utc>,
}
