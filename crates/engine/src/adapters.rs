//! Webhook body → `RawWebhook` adapter (§9 Design Notes: "dynamic
//! object-shaped payloads in the source become typed sum types +
//! free-form payload maps only at the ingress boundary"). One common
//! envelope shape across both sources; everything outside the known
//! slots is carried through as `fields` for rule evaluation.

use std::collections::BTreeSet;

use broker_core::{BrokerError, EventSource};
use broker_core::raw::RawWebhook;
use serde::Deserialize;
use serde_json::Map as JsonMap;

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    kind: String,
    #[serde(default)]
    subject_key: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    authors: BTreeSet<String>,
    #[serde(default)]
    assignees: BTreeSet<String>,
    #[serde(default)]
    mentions: BTreeSet<String>,
    #[serde(default)]
    previous_assignee: Option<String>,
    #[serde(default)]
    status_from: Option<String>,
    #[serde(default)]
    status_to: Option<String>,
    #[serde(default)]
    fields: JsonMap<String, serde_json::Value>,
}

/// Parses one inbound webhook body into the classifier's input shape.
/// A body that doesn't even parse as the common envelope is an
/// `InvalidPayload`, never a partial `Event` (§4.0 contract).
pub fn parse_raw_webhook(source: EventSource, body: &[u8]) -> Result<RawWebhook, BrokerError> {
    let envelope: WebhookEnvelope =
        serde_json::from_slice(body).map_err(|e| BrokerError::InvalidPayload(format!("malformed webhook body: {e}")))?;

    let status_transition = match (envelope.status_from, envelope.status_to) {
        (Some(from), Some(to)) => Some((from, to)),
        _ => None,
    };

    Ok(RawWebhook {
        source,
        raw_kind: envelope.kind,
        fields: envelope.fields,
        subject_key: envelope.subject_key,
        title: envelope.title,
        body: envelope.body,
        labels: envelope.labels,
        priority: envelope.priority,
        project: envelope.project,
        components: envelope.components,
        authors: envelope.authors,
        assignees: envelope.assignees,
        mentions: envelope.mentions,
        previous_assignee: envelope.previous_assignee,
        status_transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_envelope_parses() {
        let body = br#"{"kind":"issue.created","subject_key":"ENG-1"}"#;
        let raw = parse_raw_webhook(EventSource::IssueTracker, body).unwrap();
        assert_eq!(raw.raw_kind, "issue.created");
        assert_eq!(raw.subject_key.as_deref(), Some("ENG-1"));
    }

    #[test]
    fn malformed_body_is_invalid_payload() {
        let err = parse_raw_webhook(EventSource::IssueTracker, b"not json").unwrap_err();
        assert!(matches!(err, BrokerError::InvalidPayload(_)));
    }

    #[test]
    fn status_transition_requires_both_sides() {
        let body = br#"{"kind":"issue.status_changed","status_from":"open"}"#;
        let raw = parse_raw_webhook(EventSource::IssueTracker, body).unwrap();
        assert!(raw.status_transition.is_none());
    }
}
