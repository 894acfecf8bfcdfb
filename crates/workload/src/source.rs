//! The boundary between the workload analyzer and whatever system
//! tracks assignment counts, story points, and overdue state. Mirrors
//! `broker_core::ownership::OwnershipResolver`'s call-site-injected
//! trait pattern so this crate never depends on a specific issue
//! tracker client.

use crate::types::WorkloadInputs;

pub trait WorkloadSource: Send + Sync {
    fn inputs_for(&self, assignee: &str) -> WorkloadInputs;
}

/// Source with no backing data; every assignee scores as idle. Used in
/// tests and as a safe default before a real source is wired in.
pub struct NullWorkloadSource;

impl WorkloadSource for NullWorkloadSource {
    fn inputs_for(&self, _assignee: &str) -> WorkloadInputs {
        WorkloadInputs::default()
    }
}
