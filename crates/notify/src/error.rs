//! Transport-layer errors (§4.6: distinguishes transient vs permanent
//! downstream failure so the dispatcher's retry/circuit-breaker logic
//! can act on it).

use broker_core::BrokerError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport configuration error: {0}")]
    Config(String),

    #[error("downstream rejected delivery ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl From<TransportError> for BrokerError {
    fn from(err: TransportError) -> Self {
        match &err {
            TransportError::Config(msg) => BrokerError::ConfigError(msg.clone()),
            TransportError::Rejected { status, body } if (400..500).contains(status) => {
                BrokerError::PermanentDownstream(format!("{status}: {body}"))
            }
            other => BrokerError::TransientDownstream(other.to_string()),
        }
    }
}
