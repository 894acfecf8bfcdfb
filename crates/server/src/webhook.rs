//! Inbound webhook ingress (§6): one route per source, HMAC-verified,
//! forwarded to the pipeline via `EventIngestor`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use broker_core::EventSource;

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-broker-signature";

fn parse_source(path_segment: &str) -> Option<EventSource> {
    match path_segment {
        "source-control" => Some(EventSource::SourceControl),
        "issue-tracker" => Some(EventSource::IssueTracker),
        "manual" => Some(EventSource::Manual),
        _ => None,
    }
}

pub async fn ingest_webhook(
    State(state): State<Arc<AppState>>,
    Path(source_segment): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let Some(source) = parse_source(&source_segment) else {
        return (StatusCode::BAD_REQUEST, format!("unknown webhook source '{source_segment}'")).into_response();
    };

    if let Some(secret) = state.webhook_secrets.get(&source) {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        let valid = signature.is_some_and(|sig| crate::auth::verify_signature(secret, &body, sig));
        if !valid {
            return (StatusCode::UNAUTHORIZED, "signature verification failed").into_response();
        }
    }

    match state.ingestor.ingest(source, body).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_sources() {
        assert_eq!(parse_source("source-control"), Some(EventSource::SourceControl));
        assert_eq!(parse_source("issue-tracker"), Some(EventSource::IssueTracker));
        assert_eq!(parse_source("manual"), Some(EventSource::Manual));
        assert_eq!(parse_source("smoke-signals"), None);
    }
}
