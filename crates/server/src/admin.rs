//! Operational admin routes (§6 CLI surface: `drain`, `replay`,
//! `dedup purge`), the HTTP side of `broker-cli`'s thin client.
//! Grounded on `control.rs`'s handler shape.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Serialize)]
struct DrainResponse {
    batches_flushed: usize,
}

pub async fn drain(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let batches_flushed = state.admin.drain().await;
    Json(DrainResponse { batches_flushed })
}

#[derive(Deserialize)]
pub struct ReplayQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

pub async fn replay(State(state): State<Arc<AppState>>, Query(query): Query<ReplayQuery>) -> impl IntoResponse {
    let records = state.admin.replay(query.from, query.to).await;
    Json(records)
}

#[derive(Deserialize)]
pub struct PurgeDedupBody {
    kind: String,
}

#[derive(Serialize)]
struct PurgeDedupResponse {
    purged: usize,
}

pub async fn purge_dedup(State(state): State<Arc<AppState>>, Json(body): Json<PurgeDedupBody>) -> impl IntoResponse {
    let purged = state.admin.purge_dedup(&body.kind);
    Json(PurgeDedupResponse { purged })
}
