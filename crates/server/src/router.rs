//! HTTP router construction (§6), grounded on
//! `server::router::build_router` shape.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::admin;
use crate::control;
use crate::health;
use crate::state::AppState;
use crate::webhook;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks/{source}", post(webhook::ingest_webhook))
        .route("/teams/{team_id}", get(control::get_team).put(control::put_team))
        .route("/teams/{team_id}/validate", post(control::validate_team))
        .route("/teams/{team_id}/snapshots", get(control::list_snapshots))
        .route(
            "/teams/{team_id}/snapshots/{version}/rollback",
            put(control::rollback_snapshot),
        )
        .route("/admin/drain", post(admin::drain))
        .route("/admin/replay", get(admin::replay))
        .route("/admin/dedup/purge", post(admin::purge_dedup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
