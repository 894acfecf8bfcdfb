//! Closed set of error categories for the broker's data plane and
//! control plane. Every stage maps its failures into one of these
//! variants; nothing escapes as an untyped error across a stage
//! boundary.

use thiserror::Error;

/// The broker's single error type. Variants mirror the closed
/// category set so that any consumer (HTTP layer, CLI, execution log)
/// can match on `category()` without string comparison.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Malformed webhook body; no partial `Event` is ever produced for
    /// this variant.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Webhook signature failed HMAC verification.
    #[error("auth failure: {0}")]
    AuthFailure(String),

    /// Team config failed validation, or referenced a hook id that
    /// does not exist.
    #[error("config error: {0}")]
    ConfigError(String),

    /// Retriable downstream failure (timeout, 5xx).
    #[error("transient downstream failure: {0}")]
    TransientDownstream(String),

    /// Non-retriable downstream failure (4xx, categorised).
    #[error("permanent downstream failure: {0}")]
    PermanentDownstream(String),

    /// Bug or unexpected internal state.
    #[error("internal error: {0}")]
    Internal(String),
}

/// The category tag alone, for routing decisions that don't need the
/// message (execution record status, circuit breaker bookkeeping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    InvalidPayload,
    AuthFailure,
    ConfigError,
    TransientDownstream,
    PermanentDownstream,
    Internal,
}

impl BrokerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BrokerError::InvalidPayload(_) => ErrorCategory::InvalidPayload,
            BrokerError::AuthFailure(_) => ErrorCategory::AuthFailure,
            BrokerError::ConfigError(_) => ErrorCategory::ConfigError,
            BrokerError::TransientDownstream(_) => ErrorCategory::TransientDownstream,
            BrokerError::PermanentDownstream(_) => ErrorCategory::PermanentDownstream,
            BrokerError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Whether a retry loop should attempt this operation again.
    pub fn is_retriable(&self) -> bool {
        matches!(self.category(), ErrorCategory::TransientDownstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retriable() {
        let e = BrokerError::TransientDownstream("timeout".into());
        assert!(e.is_retriable());
    }

    #[test]
    fn permanent_is_not_retriable() {
        let e = BrokerError::PermanentDownstream("404".into());
        assert!(!e.is_retriable());
    }

    #[test]
    fn category_matches_variant() {
        assert_eq!(
            BrokerError::InvalidPayload("x".into()).category(),
            ErrorCategory::InvalidPayload
        );
        assert_eq!(
            BrokerError::Internal("x".into()).category(),
            ErrorCategory::Internal
        );
    }
}
