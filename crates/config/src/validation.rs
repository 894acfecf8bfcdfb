//! Team config validation (§4.9): structural, semantic, referential.

use broker_rules::{Operator, RuleAction};
use chrono_tz_name_check::is_known_timezone;

use crate::types::TeamConfig;

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }

    fn error_with_suggestion(
        &mut self,
        path: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        });
    }
}

const KNOWN_FIELD_PATHS: &[&str] = &[
    "id",
    "source",
    "kind",
    "subject_key",
    "classification.category",
    "classification.urgency",
    "classification.significance",
    "authors",
    "assignees",
    "mentions",
    "affected_teams",
];

/// Validate a team config against structural, semantic, and
/// referential rules. Never panics; always returns a result, even for
/// a wildly malformed document.
pub fn validate(config: &TeamConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.team_id.trim().is_empty() {
        result.error("team_id", "team_id must not be empty");
    }

    for (kind, channel) in &config.default_channels {
        if !is_valid_channel_name(channel) {
            result.error_with_suggestion(
                format!("default_channels.{kind}"),
                format!("channel name '{channel}' is not in the expected '#name' format"),
                format!("#{}", channel.trim_start_matches('#')),
            );
        }
    }

    if !is_known_timezone(&config.work_hours.timezone) {
        result.error(
            "work_hours.timezone",
            format!("unknown timezone '{}'", config.work_hours.timezone),
        );
    }

    if !is_valid_channel_name(&config.escalation_channel) {
        result.error(
            "escalation_channel",
            format!("'{}' is not a valid channel name", config.escalation_channel),
        );
    }

    let mut seen_rule_ids = std::collections::HashSet::new();
    for rule in &config.rules {
        if !seen_rule_ids.insert(rule.id.clone()) {
            result.error("rules", format!("duplicate rule id '{}'", rule.id));
        }

        for leaf in rule.tree.leaves() {
            if !KNOWN_FIELD_PATHS.contains(&leaf.field.as_str())
                && !leaf.field.starts_with("payload.")
            {
                result.warn(
                    format!("rules.{}.field", rule.id),
                    format!("field path '{}' does not resolve to a known Event field", leaf.field),
                );
            }
            if leaf.operator == Operator::Regex && leaf.value.as_str().is_none() {
                result.error(
                    format!("rules.{}.field", rule.id),
                    "regex operator requires a string value",
                );
            }
        }

        if let RuleAction::Route { channels } = &rule.action {
            for ch in channels {
                if !config.hooks.contains_key(&ch.hook_id) {
                    result.error(
                        format!("rules.{}.action.channels", rule.id),
                        format!("hook id '{}' is not registered for this team", ch.hook_id),
                    );
                }
                if !is_valid_channel_name(&ch.channel) {
                    result.error(
                        format!("rules.{}.action.channels", rule.id),
                        format!("'{}' is not a valid channel name", ch.channel),
                    );
                }
            }
        }
    }

    if matches!(config.work_hours.weekly.get(&chrono::Weekday::Mon), None)
        && matches!(config.work_hours.weekly.get(&chrono::Weekday::Tue), None)
    {
        result.warn("work_hours.weekly", "no weekday work hours configured");
    }

    result
}

fn is_valid_channel_name(name: &str) -> bool {
    name.starts_with('#') && name.len() > 1 && name[1..].chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    })
}

/// Minimal known-timezone check, avoiding a dependency on chrono-tz's
/// full database from within this module's unit tests; the real
/// check used at runtime goes through `broker-scheduler`'s
/// `chrono-tz` parse, this is a cheap pre-filter for common names.
mod chrono_tz_name_check {
    pub fn is_known_timezone(name: &str) -> bool {
        name.parse::<chrono_tz::Tz>().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_team_id_is_an_error() {
        let config = TeamConfig::new_empty("");
        let result = validate(&config);
        assert!(!result.valid());
    }

    #[test]
    fn default_config_is_valid() {
        let config = TeamConfig::new_empty("eng");
        let result = validate(&config);
        assert!(result.valid(), "{:?}", result.errors);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let mut config = TeamConfig::new_empty("eng");
        config.work_hours.timezone = "Mars/Olympus_Mons".to_string();
        let result = validate(&config);
        assert!(!result.valid());
    }

    #[test]
    fn bad_channel_name_suggests_a_fix() {
        let mut config = TeamConfig::new_empty("eng");
        config.default_channels.insert("issue_created".to_string(), "eng-alerts".to_string());
        let result = validate(&config);
        assert!(!result.valid());
        assert!(result.errors[0].suggestion.is_some());
    }

    #[test]
    fn route_action_referencing_unknown_hook_is_rejected() {
        use broker_rules::{ChannelOverride, Condition, Rule, RuleAction, RuleTree};
        let mut config = TeamConfig::new_empty("eng");
        config.rules.push(Rule {
            id: "r1".to_string(),
            priority: 1,
            enabled: true,
            hook_scope: vec!["*".to_string()],
            tree: RuleTree::Leaf(Condition {
                field: "subject_key".to_string(),
                operator: Operator::Neq,
                value: serde_json::json!(""),
            }),
            action: RuleAction::Route {
                channels: vec![ChannelOverride {
                    channel: "#eng".to_string(),
                    hook_id: "missing-hook".to_string(),
                    urgency_override: None,
                }],
            },
        });
        let result = validate(&config);
        assert!(!result.valid());
    }
}
