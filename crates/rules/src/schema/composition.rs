//! Boolean composition of leaf conditions: `and | or | not` internal
//! nodes over `Condition` leaves.

use serde::{Deserialize, Serialize};

use super::Condition;

/// A boolean tree of conditions. Untagged so rule documents can write
/// either a bare leaf or a composition node without a discriminator
/// key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleTree {
    Leaf(Condition),
    And(Vec<RuleTree>),
    Or(Vec<RuleTree>),
    Not(Box<RuleTree>),
}

impl RuleTree {
    /// Visits every leaf in a stable, deterministic left-to-right
    /// order. Used by the evaluator to pre-compile regex leaves once
    /// per rule-snapshot, keyed by position.
    pub fn leaves(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            RuleTree::Leaf(c) => out.push(c),
            RuleTree::And(nodes) | RuleTree::Or(nodes) => {
                for n in nodes {
                    n.collect_leaves(out);
                }
            }
            RuleTree::Not(inner) => inner.collect_leaves(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Operator;

    fn leaf(field: &str) -> RuleTree {
        RuleTree::Leaf(Condition {
            field: field.to_string(),
            operator: Operator::Eq,
            value: serde_json::json!("x"),
        })
    }

    #[test]
    fn leaves_visits_nested_nodes_in_order() {
        let tree = RuleTree::And(vec![
            leaf("a"),
            RuleTree::Or(vec![leaf("b"), RuleTree::Not(Box::new(leaf("c")))]),
        ]);
        let fields: Vec<&str> = tree.leaves().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }
}
