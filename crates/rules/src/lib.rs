//! Team-scoped boolean rule trees and their evaluation against
//! enriched events (§3 Rule, §4.1 Rule engine).

pub mod error;
pub mod evaluator;
pub mod field_path;
pub mod schema;

pub use error::RuleError;
pub use evaluator::{EvalOutcome, RuleSet};
pub use schema::{ChannelOverride, Condition, Operator, Rule, RuleAction, RuleTree};
