//! Rule evaluation (§4.1): select, order, short-circuit, evaluate.

use std::cell::RefCell;
use std::collections::HashMap;

use broker_core::Event;
use regex::Regex;

use crate::error::{EvalWarning, RuleError};
use crate::field_path::{self, FieldValue};
use crate::schema::{ChannelOverride, Condition, Operator, Rule, RuleAction, RuleTree};

/// Outcome of evaluating one team's rules against one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Suppressed { reason: String },
    Routed(Vec<ChannelOverride>),
    /// No rule matched; caller falls back to the team default channel
    /// for the event kind.
    NoMatch,
}

/// A compiled, priority-ordered set of rules for one team. Regex
/// leaves are compiled once here and reused across every `evaluate`
/// call against this snapshot (§4.1 step 5).
pub struct RuleSet {
    rules: Vec<Rule>,
    compiled_regex: HashMap<(String, usize), Regex>,
}

impl RuleSet {
    pub fn compile(mut rules: Vec<Rule>) -> Result<Self, RuleError> {
        // Descending priority; ties broken by stable rule-id ordering
        // (§4.1 step 2).
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut compiled_regex = HashMap::new();
        for rule in &rules {
            for (idx, leaf) in rule.tree.leaves().into_iter().enumerate() {
                if leaf.operator == Operator::Regex {
                    let pattern = leaf
                        .value
                        .as_str()
                        .ok_or_else(|| RuleError::InvalidRegex {
                            rule_id: rule.id.clone(),
                            leaf_index: idx,
                            source: regex::Error::Syntax("regex value must be a string".into()),
                        })?;
                    let re = Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
                        rule_id: rule.id.clone(),
                        leaf_index: idx,
                        source,
                    })?;
                    compiled_regex.insert((rule.id.clone(), idx), re);
                }
            }
        }

        Ok(Self { rules, compiled_regex })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate this rule set against `event`, short-circuiting at the
    /// first matching `block` or `route` rule. Returns the outcome
    /// plus any non-fatal evaluation warnings collected along the way.
    pub fn evaluate(&self, event: &Event) -> (EvalOutcome, Vec<EvalWarning>) {
        let category = event.classification.category.as_str();
        let kind_tag = field_path::resolve(event, "kind");
        let kind_tag = match &kind_tag {
            FieldValue::Str(s) => s.as_str(),
            _ => "",
        };

        let warnings = RefCell::new(Vec::new());

        for rule in &self.rules {
            if !rule.enabled || !rule.in_scope(kind_tag, category) {
                continue;
            }

            let leaves = rule.tree.leaves();
            let matched = self.eval_tree(&rule.tree, rule, &leaves, event, &warnings);
            if matched {
                return match &rule.action {
                    RuleAction::Block { reason } => (
                        EvalOutcome::Suppressed { reason: reason.clone() },
                        warnings.into_inner(),
                    ),
                    RuleAction::Route { channels } => (
                        EvalOutcome::Routed(channels.clone()),
                        warnings.into_inner(),
                    ),
                };
            }
        }

        (EvalOutcome::NoMatch, warnings.into_inner())
    }

    fn eval_tree(
        &self,
        tree: &RuleTree,
        rule: &Rule,
        all_leaves: &[&Condition],
        event: &Event,
        warnings: &RefCell<Vec<EvalWarning>>,
    ) -> bool {
        match tree {
            RuleTree::Leaf(cond) => {
                let leaf_index = all_leaves
                    .iter()
                    .position(|c| std::ptr::eq(*c, cond))
                    .unwrap_or(0);
                self.eval_leaf(rule, leaf_index, cond, event, warnings)
            }
            RuleTree::And(nodes) => nodes
                .iter()
                .all(|n| self.eval_tree(n, rule, all_leaves, event, warnings)),
            RuleTree::Or(nodes) => nodes
                .iter()
                .any(|n| self.eval_tree(n, rule, all_leaves, event, warnings)),
            RuleTree::Not(inner) => !self.eval_tree(inner, rule, all_leaves, event, warnings),
        }
    }

    fn eval_leaf(
        &self,
        rule: &Rule,
        leaf_index: usize,
        cond: &Condition,
        event: &Event,
        warnings: &RefCell<Vec<EvalWarning>>,
    ) -> bool {
        let resolved = field_path::resolve(event, &cond.field);

        match cond.operator {
            Operator::Regex => {
                let text = match &resolved {
                    FieldValue::Str(s) => s.clone(),
                    FieldValue::Missing => return false,
                    other => format!("{other:?}"),
                };
                self.compiled_regex
                    .get(&(rule.id.clone(), leaf_index))
                    .map(|re| re.is_match(&text))
                    .unwrap_or(false)
            }
            Operator::Contains => match &resolved {
                FieldValue::Missing => false,
                FieldValue::Str(s) => cond
                    .value
                    .as_str()
                    .map(|needle| s.contains(needle))
                    .unwrap_or(false),
                FieldValue::List(items) => {
                    let needle = FieldValue::from_json_value(&cond.value);
                    items.contains(&needle)
                }
                _ => false,
            },
            Operator::In => self.eval_leaf_in(cond, &resolved),
            Operator::NotIn => !self.eval_leaf_in(cond, &resolved),
            Operator::Eq => resolved == FieldValue::from_json_value(&cond.value),
            Operator::Neq => resolved != FieldValue::from_json_value(&cond.value),
            Operator::Gt | Operator::Lt => {
                let (a, b) = match (&resolved, cond.value.as_f64()) {
                    (FieldValue::Num(a), Some(b)) => (*a, b),
                    _ => {
                        warnings.borrow_mut().push(EvalWarning {
                            rule_id: rule.id.clone(),
                            field: cond.field.clone(),
                            message: "operator/value type mismatch".to_string(),
                        });
                        return false;
                    }
                };
                if cond.operator == Operator::Gt {
                    a > b
                } else {
                    a < b
                }
            }
        }
    }

    fn eval_leaf_in(&self, cond: &Condition, resolved: &FieldValue) -> bool {
        match resolved {
            FieldValue::List(items) => {
                let needle = FieldValue::from_json_value(&cond.value);
                items.contains(&needle)
            }
            single => cond
                .value
                .as_array()
                .map(|arr| arr.iter().any(|v| *single == FieldValue::from_json_value(v)))
                .unwrap_or(false),
        }
    }
}

impl FieldValue {
    fn from_json_value(value: &serde_json::Value) -> FieldValue {
        match value {
            serde_json::Value::String(s) => FieldValue::Str(s.clone()),
            serde_json::Value::Number(n) => {
                n.as_f64().map(FieldValue::Num).unwrap_or(FieldValue::Missing)
            }
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Array(items) => {
                FieldValue::List(items.iter().map(FieldValue::from_json_value).collect())
            }
            _ => FieldValue::Missing,
        }
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

    fn event_with_label_field(value: &str) -> Event {
        let mut fields = serde_json::Map::new();
        fields.insert("team".to_string(), serde_json::json!(value));
        let raw = RawWebhook {
            source: EventSource::IssueTracker,
            raw_kind: "issue.updated".to_string(),
            fields,
            subject_key: Some("ENG-1".to_string()),
            title: Some("hello".to_string()),
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

    fn block_rule(id: &str, priority: i32, field: &str, eq: &str) -> Rule {
        Rule {
            id: id.to_string(),
            priority,
            enabled: true,
            hook_scope: vec!["*".to_string()],
            tree: RuleTree::Leaf(Condition {
                field: field.to_string(),
                operator: Operator::Eq,
                value: serde_json::json!(eq),
            }),
            action: RuleAction::Block { reason: "blocked by rule".to_string() },
        }
    }

    #[test]
    fn higher_priority_rule_short_circuits_lower() {
        let high = block_rule("high", 10, "payload.team", "billing");
        let mut low = block_rule("low", 1, "payload.team", "billing");
        low.action = RuleAction::Route { channels: vec![] };

        let set = RuleSet::compile(vec![low, high]).unwrap();
        let event = event_with_label_field("billing");
        let (outcome, _) = set.evaluate(&event);
        assert!(matches!(outcome, EvalOutcome::Suppressed { .. }));
    }

    #[test]
    fn disabled_rule_is_skipped() {
        let mut rule = block_rule("r1", 5, "payload.team", "billing");
        rule.enabled = false;
        let set = RuleSet::compile(vec![rule]).unwrap();
        let event = event_with_label_field("billing");
        let (outcome, _) = set.evaluate(&event);
        assert_eq!(outcome, EvalOutcome::NoMatch);
    }

    #[test]
    fn missing_field_never_equals_literal() {
        let rule = block_rule("r1", 5, "payload.nonexistent", "anything");
        let set = RuleSet::compile(vec![rule]).unwrap();
        let event = event_with_label_field("billing");
        let (outcome, _) = set.evaluate(&event);
        assert_eq!(outcome, EvalOutcome::NoMatch);
    }

    #[test]
    fn type_mismatch_on_gt_produces_warning_not_halt() {
        let rule = Rule {
            id: "r1".to_string(),
            priority: 1,
            enabled: true,
            hook_scope: vec!["*".to_string()],
            tree: RuleTree::Leaf(Condition {
                field: "payload.team".to_string(),
                operator: Operator::Gt,
                value: serde_json::json!(5),
            }),
            action: RuleAction::Block { reason: "x".to_string() },
        };
        let set = RuleSet::compile(vec![rule]).unwrap();
        let event = event_with_label_field("billing");
        let (outcome, warnings) = set.evaluate(&event);
        assert_eq!(outcome, EvalOutcome::NoMatch);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn regex_leaf_matches_compiled_pattern() {
        let rule = Rule {
            id: "r1".to_string(),
            priority: 1,
            enabled: true,
            hook_scope: vec!["*".to_string()],
            tree: RuleTree::Leaf(Condition {
                field: "payload.team".to_string(),
                operator: Operator::Regex,
                value: serde_json::json!("^bill"),
            }),
            action: RuleAction::Block { reason: "x".to_string() },
        };
        let set = RuleSet::compile(vec![rule]).unwrap();
        let event = event_with_label_field("billing");
        let (outcome, _) = set.evaluate(&event);
        assert!(matches!(outcome, EvalOutcome::Suppressed { .. }));
    }

    #[test]
    fn ties_broken_by_rule_id() {
        let mut a = block_rule("aaa", 5, "payload.team", "billing");
        a.action = RuleAction::Route { channels: vec![] };
        let b = block_rule("zzz", 5, "payload.team", "billing");
        let set = RuleSet::compile(vec![b, a]).unwrap();
        assert_eq!(set.rules()[0].id, "aaa");
    }
}
