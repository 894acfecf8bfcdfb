//! Shared application state (§6): wraps the config loader behind
//! `Arc`, the same shape as the `AppState`/`router` pairing,
//! trimmed to this spec's surface.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, Utc};

use broker_config::ConfigLoader;
use broker_core::{EventSource, ExecutionRecord};

use crate::error::IngestError;

/// The pipeline boundary the HTTP layer hands verified webhook bodies
/// to. Kept as a trait so `broker-server` never depends on
/// `broker-engine` — the engine is the one crate that depends on the
/// server, not the other way around, and supplies the concrete
/// implementation when it builds the router.
#[async_trait]
pub trait EventIngestor: Send + Sync {
    async fn ingest(&self, source: EventSource, body: Bytes) -> Result<(), IngestError>;
}

/// The operational control-plane boundary `broker-cli`'s `drain`,
/// `replay`, and `dedup purge` subcommands talk to, mirroring
/// `EventIngestor`'s same-crate-trait/engine-supplied-impl split.
#[async_trait]
pub trait AdminOps: Send + Sync {
    /// Flushes every open batch immediately and returns how many were
    /// dispatched (§4.4/§5 shutdown: "nothing is lost on graceful
    /// shutdown"; persisted scheduled entries are left for the
    /// scheduler to restore, per §5's lifecycle).
    async fn drain(&self) -> usize;

    /// Every execution record started within `[from, to]`, across
    /// every hook this instance has routed through.
    async fn replay(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ExecutionRecord>;

    /// Drops every dedup entry of the given kind category, returning
    /// how many were purged.
    fn purge_dedup(&self, kind: &str) -> usize;
}

pub struct AppState {
    pub config: Arc<ConfigLoader>,
    pub ingestor: Arc<dyn EventIngestor>,
    pub admin: Arc<dyn AdminOps>,
    /// Per-source shared webhook secret, resolved from `BrokerConfig`.
    pub webhook_secrets: HashMap<EventSource, String>,
}

impl AppState {
    pub fn new(
        config: Arc<ConfigLoader>,
        ingestor: Arc<dyn EventIngestor>,
        admin: Arc<dyn AdminOps>,
        webhook_secrets: HashMap<EventSource, String>,
    ) -> Self {
        Self {
            config,
            ingestor,
            admin,
            webhook_secrets,
        }
    }
}
