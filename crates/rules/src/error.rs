use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid regex in rule {rule_id} at leaf {leaf_index}: {source}")]
    InvalidRegex {
        rule_id: String,
        leaf_index: usize,
        #[source]
        source: regex::Error,
    },
}

/// A non-fatal evaluation problem: an operator/value type mismatch.
/// Logged to the execution log by the caller, never halts evaluation
/// (§4.1 failure semantics) — the offending leaf is simply `false`.
#[derive(Debug, Clone)]
pub struct EvalWarning {
    pub rule_id: String,
    pub field: String,
    pub message: String,
}
