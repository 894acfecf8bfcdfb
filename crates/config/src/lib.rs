//! Team configuration: types, versioned snapshots, hot-reload loader,
//! validator, and audit trail (§3 TeamConfig, §4.9 Config loader +
//! validator).

pub mod audit;
pub mod error;
pub mod loader;
pub mod ownership;
pub mod snapshot;
pub mod types;
pub mod validation;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use ownership::OwnershipRegistry;
pub use snapshot::SnapshotStore;
pub use types::{BatchParams, Hook, QuietHours, TeamConfig, WeekendPolicy};
pub use validation::{ValidationIssue, ValidationResult};
