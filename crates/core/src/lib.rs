//! Shared data model, error categories, classifier, and ambient
//! configuration for the developer-workflow event broker.

pub mod classify;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod execution;
pub mod hash;
pub mod ownership;
pub mod raw;
pub mod workhours;

pub use decision::{Decision, Disposition};
pub use error::BrokerError;
pub use event::{Classification, Event, EventKind, EventSource, Significance, Urgency};
pub use execution::{ExecutionRecord, ExecutionStatus};
