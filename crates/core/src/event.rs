//! The canonical enriched event shape (§3). Built once at ingress by
//! `classify::classify`, never mutated afterwards.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonMap;

/// Where a webhook delivery originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    SourceControl,
    IssueTracker,
    Manual,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::SourceControl => "source-control",
            EventSource::IssueTracker => "issue-tracker",
            EventSource::Manual => "manual",
        }
    }
}

/// Typed discriminator for the event kind. Any kind the ingress layer
/// does not recognise is mapped to `Other`, never dropped (§4.0).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PrOpened,
    PrReady,
    PrApproved,
    PrConflicts,
    PrMerged,
    PrClosed,
    IssueCreated,
    IssueUpdated,
    IssueStatus,
    IssuePriority,
    IssueAssignment,
    IssueComment,
    IssueBlocker,
    Alert,
    Deployment,
    Other(String),
}

impl EventKind {
    /// Coarse category bucket used by the classifier and by rule
    /// leaves that match on `category` rather than the exact kind.
    pub fn category(&self) -> &'static str {
        match self {
            EventKind::PrOpened
            | EventKind::PrReady
            | EventKind::PrApproved
            | EventKind::PrConflicts
            | EventKind::PrMerged
            | EventKind::PrClosed => "pull_request",
            EventKind::IssueCreated
            | EventKind::IssueUpdated
            | EventKind::IssueStatus
            | EventKind::IssuePriority
            | EventKind::IssueAssignment
            | EventKind::IssueComment
            | EventKind::IssueBlocker => "issue",
            EventKind::Alert => "alert",
            EventKind::Deployment => "deployment",
            EventKind::Other(_) => "other",
        }
    }
}

/// Urgency ordinal. Derives `Ord` so classifier monotonicity (§8
/// property 1) is a plain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Med,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Minor,
    Moderate,
    Major,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub urgency: Urgency,
    pub significance: Significance,
}

/// The canonical enriched event. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: EventSource,
    pub kind: EventKind,
    pub payload: JsonMap<String, serde_json::Value>,
    pub subject_key: Option<String>,
    pub authors: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub mentions: BTreeSet<String>,
    pub affected_teams: BTreeSet<String>,
    pub classification: Classification,
    pub content_hash: String,
    pub similarity_hash: u64,
    pub ingested_at: DateTime<Utc>,
}

impl Event {
    /// `(source, subject_key, content_hash)` is the semantic-content
    /// identity described in §3's invariant.
    pub fn semantic_key(&self) -> (EventSource, Option<String>, String) {
        (self.source, self.subject_key.clone(), self.content_hash.clone())
    }
}
