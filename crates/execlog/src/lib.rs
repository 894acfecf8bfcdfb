//! Execution log and hourly aggregation (§4.7): the write path every
//! dispatch attempt lands on, and the query surface the control plane
//! and CLI read from. Grounded on
//! `stupid-rules::audit_log::AuditLog`, generalised from an unbounded
//! in-memory FIFO into a durable, retention-swept, aggregate-producing
//! log backed by `broker_storage::TabularStore`.

pub mod aggregate;
pub mod store;

pub use aggregate::{hour_bucket, HourlyAggregate};
pub use store::ExecutionLog;
