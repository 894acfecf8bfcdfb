//! Bridges `broker-server`'s `EventIngestor` boundary into the
//! pipeline. Validation happens synchronously inside `ingest` so a
//! malformed body still maps to a proper HTTP 400 at the call site;
//! only already-parsed webhooks cross the bounded channel into the
//! background consumer, matching §6's backpressure contract.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::mpsc;

use broker_core::raw::RawWebhook;
use broker_core::{BrokerError, EventSource};
use broker_server::{EventIngestor, IngestError};

use crate::adapters::parse_raw_webhook;
use crate::pipeline::Pipeline;

pub struct PipelineIngestor {
    tx: mpsc::Sender<RawWebhook>,
}

impl PipelineIngestor {
    /// Spawns the consumer loop and returns the ingestor the router's
    /// `AppState` takes as its `EventIngestor`.
    pub fn spawn(pipeline: Arc<Pipeline>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        tokio::spawn(Self::run(pipeline, rx));
        Self { tx }
    }

    async fn run(pipeline: Arc<Pipeline>, mut rx: mpsc::Receiver<RawWebhook>) {
        while let Some(raw) = rx.recv().await {
            let now = chrono::Utc::now();
            if let Err(e) = pipeline.process_webhook(raw, now).await {
                tracing::warn!(error = %e, "failed to process queued webhook");
            }
        }
    }
}

#[async_trait]
impl EventIngestor for PipelineIngestor {
    async fn ingest(&self, source: EventSource, body: Bytes) -> Result<(), IngestError> {
        let raw = parse_raw_webhook(source, &body)?;
        self.tx.try_send(raw).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => {
                IngestError::Broker(BrokerError::Internal("ingest queue consumer is gone".to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> Bytes {
        Bytes::from(json.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_queueing() {
        let (tx, mut rx) = mpsc::channel(4);
        let ingestor = PipelineIngestor { tx };
        let err = ingestor.ingest(EventSource::IssueTracker, body("not json")).await.unwrap_err();
        assert!(matches!(err, IngestError::Broker(BrokerError::InvalidPayload(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_reports_backpressure() {
        let (tx, _rx) = mpsc::channel(1);
        let ingestor = PipelineIngestor { tx };
        let envelope = r#"{"kind":"issue.created","subject_key":"ENG-1"}"#;

        ingestor.ingest(EventSource::IssueTracker, body(envelope)).await.unwrap();
        let err = ingestor.ingest(EventSource::IssueTracker, body(envelope)).await.unwrap_err();
        assert!(matches!(err, IngestError::Backpressure));
    }
}
