//! Deterministic field-path resolution against an `Event` (§4.1 step
//! 4). Unresolved paths produce `FieldValue::Missing`, a sentinel that
//! never equals any literal and for which `contains` is always
//! `false`.

use broker_core::Event;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Num(f64),
    Bool(bool),
    List(Vec<FieldValue>),
    Missing,
}

impl FieldValue {
    fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::String(s) => FieldValue::Str(s.clone()),
            Value::Number(n) => n.as_f64().map(FieldValue::Num).unwrap_or(FieldValue::Missing),
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json).collect())
            }
            Value::Null | Value::Object(_) => FieldValue::Missing,
        }
    }
}

/// Resolves a dotted path against well-known `Event` fields first,
/// falling back to `payload.<rest>` traversal for anything else.
pub fn resolve<'a>(event: &'a Event, path: &str) -> FieldValue {
    let mut parts = path.split('.');
    match parts.next() {
        Some("id") => FieldValue::Str(event.id.clone()),
        Some("source") => FieldValue::Str(event.source.as_str().to_string()),
        Some("kind") => FieldValue::Str(kind_tag(event)),
        Some("subject_key") => event
            .subject_key
            .clone()
            .map(FieldValue::Str)
            .unwrap_or(FieldValue::Missing),
        Some("classification") => match parts.next() {
            Some("category") => FieldValue::Str(event.classification.category.clone()),
            Some("urgency") => FieldValue::Str(format!("{:?}", event.classification.urgency).to_lowercase()),
            Some("significance") => {
                FieldValue::Str(format!("{:?}", event.classification.significance).to_lowercase())
            }
            _ => FieldValue::Missing,
        },
        Some("authors") => FieldValue::List(event.authors.iter().cloned().map(FieldValue::Str).collect()),
        Some("assignees") => {
            FieldValue::List(event.assignees.iter().cloned().map(FieldValue::Str).collect())
        }
        Some("mentions") => {
            FieldValue::List(event.mentions.iter().cloned().map(FieldValue::Str).collect())
        }
        Some("affected_teams") => FieldValue::List(
            event.affected_teams.iter().cloned().map(FieldValue::Str).collect(),
        ),
        Some("payload") => {
            let rest: Vec<&str> = parts.collect();
            resolve_json_path(&serde_json::Value::Object(event.payload.clone()), &rest)
        }
        _ => FieldValue::Missing,
    }
}

fn kind_tag(event: &Event) -> String {
    match &event.kind {
        broker_core::EventKind::Other(tag) => tag.clone(),
        other => format!("{other:?}"),
    }
}

fn resolve_json_path(value: &Value, path: &[&str]) -> FieldValue {
    if path.is_empty() {
        return FieldValue::from_json(value);
    }
    match value.get(path[0]) {
        Some(next) => resolve_json_path(next, &path[1..]),
        None => FieldValue::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::classify::classify;
    use broker_core::ownership::NullOwnershipResolver;
    use broker_core::raw::RawWebhook;
    use broker_core::EventSource;
    use std::collections::BTreeSet;

    fn sample_event() -> Event {
        let raw = RawWebhook {
            source: EventSource::IssueTracker,
            raw_kind: "issue.updated".to_string(),
            fields: {
                let mut m = serde_json::Map::new();
                m.insert("component".to_string(), serde_json::json!("billing"));
                m
            },
            subject_key: Some("ENG-1".to_string()),
            title: Some("title".to_string()),
            body: None,
            labels: vec![],
            priority: None,
            project: None,
            components: vec![],
            authors: BTreeSet::new(),
            assignees: BTreeSet::new(),
            mentions: BTreeSet::new(),
            previous_assignee: None,
            status_transition: None,
        };
        classify(raw, &NullOwnershipResolver, chrono::Utc::now()).unwrap()
    }

    #[test]
    fn resolves_subject_key() {
        let event = sample_event();
        assert_eq!(resolve(&event, "subject_key"), FieldValue::Str("ENG-1".to_string()));
    }

    #[test]
    fn resolves_payload_nested_field() {
        let event = sample_event();
        assert_eq!(
            resolve(&event, "payload.component"),
            FieldValue::Str("billing".to_string())
        );
    }

    #[test]
    fn unknown_path_is_missing_sentinel() {
        let event = sample_event();
        assert_eq!(resolve(&event, "nonexistent.path"), FieldValue::Missing);
    }
}
