//! The shape a webhook adapter hands to the classifier: source-
//! specific fields already normalized into common slots, but not yet
//! typed, hashed, or enriched.

use std::collections::BTreeSet;

use serde_json::Map as JsonMap;

use crate::event::EventSource;

/// Inbound payload, normalized but not yet classified.
#[derive(Debug, Clone)]
pub struct RawWebhook {
    pub source: EventSource,
    /// Source-provided kind string, e.g. `"pull_request.opened"`,
    /// `"issue.status_changed"`. Mapped to a typed `EventKind` by
    /// `classify::resolve_kind`; unrecognised strings become
    /// `EventKind::Other`.
    pub raw_kind: String,
    pub fields: JsonMap<String, serde_json::Value>,
    pub subject_key: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub priority: Option<String>,
    pub project: Option<String>,
    pub components: Vec<String>,
    pub authors: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub mentions: BTreeSet<String>,
    /// Set when this delivery is an `issue_assignment` event, holding
    /// the assignee before the change, so the classifier can detect a
    /// self-reassignment.
    pub previous_assignee: Option<String>,
    /// Set when this delivery represents a status transition, as
    /// `(from, to)`.
    pub status_transition: Option<(String, String)>,
}

impl RawWebhook {
    pub fn text_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(t) = &self.title {
            out.push(t.as_str());
        }
        if let Some(b) = &self.body {
            out.push(b.as_str());
        }
        out
    }
}
