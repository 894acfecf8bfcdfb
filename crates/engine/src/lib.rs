//! Top-level orchestrator (§5): wires L0–L9 into one pipeline, owns
//! the background tick tasks, and supplies the concrete
//! `EventIngestor` the HTTP layer (`broker-server`) dispatches into.
//! Grounded on the `server::rule_runner` background-loop
//! shape and `server::startup` wiring, at this spec's scope.

pub mod adapters;
pub mod admin;
pub mod background;
pub mod ingestor;
pub mod pipeline;
pub mod quiet;

pub use ingestor::PipelineIngestor;
pub use pipeline::{Pipeline, PipelineSettings};
pub use quiet::{ConfigQuietHoursGate, SharedQuietGate};
