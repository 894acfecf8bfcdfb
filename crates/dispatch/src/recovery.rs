//! Recovery workflows (§4.6): what to do next when a dispatch attempt
//! fails, keyed by `(ErrorCategory, service)`. Closed step set per
//! spec; workflows are ordered lists of steps tried in sequence.

use std::collections::HashMap;

use broker_core::error::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    RetryWithBackoff,
    UseCachedData,
    PartialCollect,
    AlternativeChannel,
    DegradeContent,
    QueueForLater,
    Escalate,
}

#[derive(Debug, Clone)]
pub struct RecoveryWorkflow {
    pub steps: Vec<RecoveryStep>,
}

impl RecoveryWorkflow {
    pub fn new(steps: Vec<RecoveryStep>) -> Self {
        Self { steps }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered(RecoveryStep),
    Escalated,
}

/// Maps `(category, service)` to the workflow to run when dispatch to
/// that service fails with that category. Falls back to a
/// category-only default when no service-specific entry exists.
pub struct RecoveryRegistry {
    by_service: HashMap<(ErrorCategory, String), RecoveryWorkflow>,
    defaults: HashMap<ErrorCategory, RecoveryWorkflow>,
}

impl RecoveryRegistry {
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(
            ErrorCategory::TransientDownstream,
            RecoveryWorkflow::new(vec![
                RecoveryStep::RetryWithBackoff,
                RecoveryStep::UseCachedData,
                RecoveryStep::QueueForLater,
                RecoveryStep::Escalate,
            ]),
        );
        defaults.insert(
            ErrorCategory::PermanentDownstream,
            RecoveryWorkflow::new(vec![
                RecoveryStep::AlternativeChannel,
                RecoveryStep::DegradeContent,
                RecoveryStep::Escalate,
            ]),
        );
        defaults.insert(
            ErrorCategory::ConfigError,
            RecoveryWorkflow::new(vec![RecoveryStep::Escalate]),
        );
        defaults.insert(
            ErrorCategory::Internal,
            RecoveryWorkflow::new(vec![RecoveryStep::QueueForLater, RecoveryStep::Escalate]),
        );
        Self {
            by_service: HashMap::new(),
            defaults,
        }
    }

    pub fn set_for_service(&mut self, category: ErrorCategory, service: impl Into<String>, workflow: RecoveryWorkflow) {
        self.by_service.insert((category, service.into()), workflow);
    }

    pub fn workflow_for(&self, category: ErrorCategory, service: &str) -> Option<&RecoveryWorkflow> {
        self.by_service
            .get(&(category, service.to_string()))
            .or_else(|| self.defaults.get(&category))
    }
}

impl Default for RecoveryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_defaults_to_retry_first() {
        let registry = RecoveryRegistry::new();
        let workflow = registry
            .workflow_for(ErrorCategory::TransientDownstream, "slack")
            .expect("default present");
        assert_eq!(workflow.steps[0], RecoveryStep::RetryWithBackoff);
    }

    #[test]
    fn service_override_wins() {
        let mut registry = RecoveryRegistry::new();
        registry.set_for_service(
            ErrorCategory::TransientDownstream,
            "slack",
            RecoveryWorkflow::new(vec![RecoveryStep::Escalate]),
        );
        let workflow = registry
            .workflow_for(ErrorCategory::TransientDownstream, "slack")
            .unwrap();
        assert_eq!(workflow.steps, vec![RecoveryStep::Escalate]);

        let other = registry
            .workflow_for(ErrorCategory::TransientDownstream, "email")
            .unwrap();
        assert_eq!(other.steps[0], RecoveryStep::RetryWithBackoff);
    }
}
