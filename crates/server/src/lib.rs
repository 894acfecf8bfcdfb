//! Inbound webhook ingress and control-plane HTTP surface (§6).
//! Grounded on the `server::router`/`server::state`/
//! `server::api::health` shape, at this spec's much smaller scope.

pub mod admin;
pub mod auth;
pub mod control;
pub mod error;
pub mod health;
pub mod router;
pub mod state;
pub mod webhook;

pub use error::IngestError;
pub use router::build_router;
pub use state::{AdminOps, AppState, EventIngestor};
