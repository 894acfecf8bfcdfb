//! HTTP-facing error mapping (§6 inbound webhook interface response
//! codes). `BrokerError`'s closed category set maps onto status codes;
//! backpressure is an ingestion-specific signal, not a broker error
//! category, so it is modelled as a sibling variant here rather than
//! widened into `BrokerError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use broker_core::error::ErrorCategory;
use broker_core::BrokerError;

#[derive(Debug)]
pub enum IngestError {
    Broker(BrokerError),
    Backpressure,
}

impl From<BrokerError> for IngestError {
    fn from(err: BrokerError) -> Self {
        IngestError::Broker(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::Backpressure => {
                (StatusCode::TOO_MANY_REQUESTS, Json(ErrorBody { error: "backpressure".to_string() })).into_response()
            }
            IngestError::Broker(err) => broker_error_response(&err),
        }
    }
}

pub fn broker_error_response(err: &BrokerError) -> Response {
    let status = match err.category() {
        ErrorCategory::InvalidPayload => StatusCode::BAD_REQUEST,
        ErrorCategory::AuthFailure => StatusCode::UNAUTHORIZED,
        ErrorCategory::ConfigError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::TransientDownstream => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::PermanentDownstream => StatusCode::BAD_GATEWAY,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorBody { error: err.to_string() })).into_response()
}
