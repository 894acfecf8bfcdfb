//! The L0 classifier (§4.0): raw webhook → enriched, immutable
//! `Event`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BrokerError;
use crate::event::{Classification, Event, EventKind, Significance, Urgency};
use crate::hash::{self_reassignment_hash, content_hash, similarity_hash};
use crate::ownership::OwnershipResolver;
use crate::raw::RawWebhook;

const URGENCY_KEYWORDS: &[&str] = &["blocker", "outage", "security", "production"];
const DECISION_KEYWORDS: &[&str] = &["decided", "approved", "let's go with", "final call"];

/// Event kinds that require `subject_key` to be present (§3: "PR
/// number, issue key ... required where applicable").
fn requires_subject_key(kind: &EventKind) -> bool {
    !matches!(kind, EventKind::Alert | EventKind::Deployment)
}

/// Maps a source-provided kind string onto the typed discriminator.
/// Anything unrecognised becomes `EventKind::Other` — never dropped at
/// this stage (§4.0 failure semantics).
pub fn resolve_kind(raw_kind: &str) -> EventKind {
    match raw_kind {
        "pull_request.opened" => EventKind::PrOpened,
        "pull_request.ready_for_review" => EventKind::PrReady,
        "pull_request.approved" => EventKind::PrApproved,
        "pull_request.conflicts" => EventKind::PrConflicts,
        "pull_request.merged" => EventKind::PrMerged,
        "pull_request.closed" => EventKind::PrClosed,
        "issue.created" => EventKind::IssueCreated,
        "issue.updated" => EventKind::IssueUpdated,
        "issue.status_changed" => EventKind::IssueStatus,
        "issue.priority_changed" => EventKind::IssuePriority,
        "issue.assignment_changed" => EventKind::IssueAssignment,
        "issue.comment_added" => EventKind::IssueComment,
        "issue.blocker_flagged" => EventKind::IssueBlocker,
        "alert" => EventKind::Alert,
        "deployment" => EventKind::Deployment,
        other => EventKind::Other(other.to_string()),
    }
}

/// Classify a raw webhook into a canonical `Event`.
pub fn classify(
    raw: RawWebhook,
    resolver: &dyn OwnershipResolver,
    now: DateTime<Utc>,
) -> Result<Event, BrokerError> {
    let kind = resolve_kind(&raw.raw_kind);

    if requires_subject_key(&kind) && raw.subject_key.is_none() {
        return Err(BrokerError::InvalidPayload(format!(
            "missing subject_key for kind {kind:?}"
        )));
    }

    let is_self_reassignment = matches!(kind, EventKind::IssueAssignment)
        && raw
            .previous_assignee
            .as_ref()
            .zip(raw.assignees.iter().next())
            .is_some_and(|(prev, new)| prev == new);

    let content_hash = if is_self_reassignment {
        self_reassignment_hash(
            raw.source.as_str(),
            raw.subject_key.as_deref().unwrap_or_default(),
        )
    } else {
        content_hash(&raw.fields)
    };

    let text_fields = raw.text_fields();
    let similarity_hash = similarity_hash(&text_fields);

    let urgency = classify_urgency(&raw);
    let transitioned_to_blocked = raw
        .status_transition
        .as_ref()
        .is_some_and(|(_, to)| to.eq_ignore_ascii_case("blocked"));
    let significance = classify_significance(
        &kind,
        urgency,
        transitioned_to_blocked,
        &raw,
        is_self_reassignment,
    );

    let affected_teams = resolver.affected_teams(
        raw.project.as_deref(),
        &raw.components,
        &raw.labels,
        &all_participants(&raw),
    );

    Ok(Event {
        id: Uuid::new_v4().to_string(),
        source: raw.source,
        kind: kind.clone(),
        payload: raw.fields,
        subject_key: raw.subject_key,
        authors: raw.authors,
        assignees: raw.assignees,
        mentions: raw.mentions,
        affected_teams,
        classification: Classification {
            category: kind.category().to_string(),
            urgency,
            significance,
        },
        content_hash,
        similarity_hash,
        ingested_at: now,
    })
}

fn all_participants(raw: &RawWebhook) -> BTreeSet<String> {
    let mut all = BTreeSet::new();
    all.extend(raw.authors.iter().cloned());
    all.extend(raw.assignees.iter().cloned());
    all.extend(raw.mentions.iter().cloned());
    all
}

/// Urgency precedence: explicit `critical`/`blocker` label → matched
/// keyword set in text → priority field → default `low` (§4.0).
fn classify_urgency(raw: &RawWebhook) -> Urgency {
    let has_explicit_label = raw
        .labels
        .iter()
        .any(|l| l.eq_ignore_ascii_case("critical") || l.eq_ignore_ascii_case("blocker"));
    if has_explicit_label {
        return Urgency::Critical;
    }

    let text = raw.text_fields().join(" ").to_lowercase();
    if URGENCY_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Urgency::Critical;
    }

    if let Some(priority) = &raw.priority {
        return match priority.to_lowercase().as_str() {
            "critical" | "p0" => Urgency::Critical,
            "high" | "p1" => Urgency::High,
            "medium" | "p2" => Urgency::Med,
            _ => Urgency::Low,
        };
    }

    Urgency::Low
}

/// Significance is a deterministic function of `(category, urgency,
/// field-delta-set)` (§4.0). A transition into `blocked` is always at
/// least `major`; a comment is `moderate` iff it carries a mention,
/// assignment change, or decision keyword, else `minor`; everything
/// else scales with urgency.
fn classify_significance(
    kind: &EventKind,
    urgency: Urgency,
    transitioned_to_blocked: bool,
    raw: &RawWebhook,
    is_self_reassignment: bool,
) -> Significance {
    if is_self_reassignment {
        return Significance::Minor;
    }

    if transitioned_to_blocked {
        return if urgency == Urgency::Critical {
            Significance::Critical
        } else {
            Significance::Major
        };
    }

    if matches!(kind, EventKind::IssueComment) {
        let text = raw.text_fields().join(" ").to_lowercase();
        let has_decision_keyword = DECISION_KEYWORDS.iter().any(|kw| text.contains(kw));
        let has_mention = !raw.mentions.is_empty();
        return if has_mention || has_decision_keyword {
            Significance::Moderate
        } else {
            Significance::Minor
        };
    }

    match urgency {
        Urgency::Critical => Significance::Major,
        Urgency::High | Urgency::Med => Significance::Moderate,
        Urgency::Low => Significance::Minor,
    }
}
