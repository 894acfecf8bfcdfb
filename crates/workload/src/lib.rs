//! The L3 workload analyzer: per-assignee capacity scoring, an input
//! to routing decisions and to warning generation (§4.3).

pub mod analyzer;
pub mod scoring;
pub mod source;
pub mod types;

pub use analyzer::WorkloadAnalyzer;
pub use scoring::ScoringConfig;
pub use source::{NullWorkloadSource, WorkloadSource};
pub use types::{Recommendation, RiskLevel, WorkloadInputs, WorkloadSnapshot};
