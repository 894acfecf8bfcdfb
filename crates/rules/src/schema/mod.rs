//! Rule tree schema (§3 Rule, §4.1).

mod composition;

pub use composition::*;

use serde::{Deserialize, Serialize};

/// The closed operator set a leaf condition may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    In,
    NotIn,
    Contains,
    Regex,
    Gt,
    Lt,
}

/// A leaf condition: `(field-path, operator, value)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

/// A channel a matched rule routes to, with an optional per-route
/// urgency override and the hook id it is delivered through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOverride {
    pub channel: String,
    pub hook_id: String,
    pub urgency_override: Option<broker_core::event::Urgency>,
}

/// What happens when a rule's tree evaluates to `true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Block { reason: String },
    Route { channels: Vec<ChannelOverride> },
}

/// A team-scoped rule (§3, §4.1): priority-ordered, hook-scoped
/// boolean tree bound to an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Event kinds (by category string or exact kind tag) this rule
    /// applies to.
    pub hook_scope: Vec<String>,
    pub tree: RuleTree,
    pub action: RuleAction,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn in_scope(&self, kind_tag: &str, category: &str) -> bool {
        self.hook_scope
            .iter()
            .any(|s| s == kind_tag || s == category || s == "*")
    }
}
