//! Generic HTTP webhook transport. Adapted from
//! `WebhookNotifier`: env-var resolution for URL/header secrets,
//! resolved eagerly at construction so a misconfigured deployment
//! fails fast rather than on first delivery.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{Notification, Transport};

#[derive(Debug)]
pub struct WebhookTransport {
    url: String,
    method: reqwest::Method,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl WebhookTransport {
    pub fn new(url: String, method: Option<reqwest::Method>, headers: HashMap<String, String>) -> Result<Self, TransportError> {
        let resolved_url = resolve_env_vars(&url)?;
        let mut resolved_headers = HashMap::with_capacity(headers.len());
        for (key, value) in &headers {
            resolved_headers.insert(key.clone(), resolve_env_vars(value)?);
        }

        Ok(Self {
            url: resolved_url,
            method: method.unwrap_or(reqwest::Method::POST),
            headers: resolved_headers,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, notification: &Notification) -> Result<(), TransportError> {
        let body = serde_json::to_string(notification)
            .map_err(|e| TransportError::Config(format!("failed to serialize notification: {e}")))?;

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %self.url, %status, body = %body_text, "webhook returned non-2xx status");
            return Err(TransportError::Rejected { status: status.as_u16(), body: body_text });
        }

        tracing::debug!(url = %self.url, method = %self.method, %status, "webhook notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Resolve `${VAR_NAME}` patterns in a string using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, TransportError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(TransportError::Config(format!("unclosed env var reference in: {input}")));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| TransportError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("BROKER_WEBHOOK_TEST_HOST", "example.com");
        let result = resolve_env_vars("https://${BROKER_WEBHOOK_TEST_HOST}/hook").unwrap();
        assert_eq!(result, "https://example.com/hook");
        std::env::remove_var("BROKER_WEBHOOK_TEST_HOST");
    }

    #[test]
    fn resolve_env_vars_missing_errors() {
        let result = resolve_env_vars("https://${BROKER_ABSOLUTELY_NOT_SET}/hook");
        assert!(result.is_err());
    }

    #[test]
    fn channel_name_is_webhook() {
        let transport = WebhookTransport::new("https://example.com".into(), None, HashMap::new()).unwrap();
        assert_eq!(transport.channel_name(), "webhook");
    }
}
