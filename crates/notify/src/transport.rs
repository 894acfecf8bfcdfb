//! External notification boundary (§1 outer surfaces, supplemented per
//! SPEC_FULL §11): rendered notification content plus the trait
//! downstream transports implement. Grounded on
//! `Notifier`/`Notification` shape, trimmed of the templating layer
//! this domain doesn't need.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::TransportError;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), TransportError>;

    fn channel_name(&self) -> &str;
}
