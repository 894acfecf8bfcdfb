//! Reference transport that logs notifications instead of delivering
//! them anywhere. Used for local development and tests.

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{Notification, Transport};

pub struct StdoutTransport;

#[async_trait]
impl Transport for StdoutTransport {
    async fn send(&self, notification: &Notification) -> Result<(), TransportError> {
        tracing::info!(subject = %notification.subject, body = %notification.body, "stdout transport delivery");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "stdout"
    }
}
