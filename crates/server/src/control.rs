//! Control-plane routes (§6): wraps `broker-config`'s loader with
//! `GET/PUT /teams/{id}`, a validation endpoint, and snapshot
//! list/rollback. Grounded on the CRUD handler shape
//! (`server::anomaly_rules::crud`), at this spec's much smaller scope.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use broker_config::types::TeamConfig;
use broker_config::validation::{self, ValidationIssue, ValidationResult};

use crate::state::AppState;

#[derive(Serialize)]
struct ValidationResponse {
    valid: bool,
    errors: Vec<IssueBody>,
    warnings: Vec<IssueBody>,
}

#[derive(Serialize)]
struct IssueBody {
    path: String,
    message: String,
    suggestion: Option<String>,
}

impl From<&ValidationResult> for ValidationResponse {
    fn from(result: &ValidationResult) -> Self {
        Self {
            valid: result.valid(),
            errors: result.errors.iter().map(issue_body).collect(),
            warnings: result.warnings.iter().map(issue_body).collect(),
        }
    }
}

fn issue_body(issue: &ValidationIssue) -> IssueBody {
    IssueBody {
        path: issue.path.clone(),
        message: issue.message.clone(),
        suggestion: issue.suggestion.clone(),
    }
}

pub async fn get_team(State(state): State<Arc<AppState>>, Path(team_id): Path<String>) -> impl IntoResponse {
    match state.config.load(&team_id) {
        Ok(config) => Json(config.as_ref().clone()).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn put_team(
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    Json(mut patch): Json<TeamConfig>,
) -> impl IntoResponse {
    patch.team_id = team_id;
    match state.config.update(patch, "control-plane") {
        Ok((snapshot, result)) if result.valid() => (StatusCode::OK, Json(snapshot.as_ref().clone())).into_response(),
        Ok((_, result)) => (StatusCode::UNPROCESSABLE_ENTITY, Json(ValidationResponse::from(&result))).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

pub async fn validate_team(Json(patch): Json<TeamConfig>) -> impl IntoResponse {
    let result = validation::validate(&patch);
    Json(ValidationResponse::from(&result))
}

#[derive(Serialize)]
struct SnapshotList {
    team_id: String,
    versions: Vec<u64>,
}

pub async fn list_snapshots(State(state): State<Arc<AppState>>, Path(team_id): Path<String>) -> impl IntoResponse {
    let versions = state.config.store.versions(&team_id);
    Json(SnapshotList { team_id, versions })
}

pub async fn rollback_snapshot(
    State(state): State<Arc<AppState>>,
    Path((team_id, version)): Path<(String, u64)>,
) -> impl IntoResponse {
    match state.config.store.rollback(&team_id, version) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot.as_ref().clone())).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
