//! Real `OwnershipResolver` implementation backing the classifier's
//! `affected_teams` derivation (§4.0): union of teams owning the
//! project key, teams owning any matching component, teams matching
//! any label prefix, and teams containing any assignee/reviewer.

use std::collections::{BTreeSet, HashMap};

use broker_core::ownership::OwnershipResolver;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipRegistry {
    pub project_owners: HashMap<String, BTreeSet<String>>,
    pub component_owners: HashMap<String, BTreeSet<String>>,
    /// `(label_prefix, owning_teams)`, checked in order.
    pub label_prefix_owners: Vec<(String, BTreeSet<String>)>,
    /// Team membership, used to attribute an event to a team whenever
    /// one of its members is an assignee/reviewer/mention.
    pub team_members: HashMap<String, BTreeSet<String>>,
}

impl OwnershipResolver for OwnershipRegistry {
    fn affected_teams(
        &self,
        project: Option<&str>,
        components: &[String],
        labels: &[String],
        participants: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut teams = BTreeSet::new();

        if let Some(project) = project {
            if let Some(owners) = self.project_owners.get(project) {
                teams.extend(owners.iter().cloned());
            }
        }

        for component in components {
            if let Some(owners) = self.component_owners.get(component) {
                teams.extend(owners.iter().cloned());
            }
        }

        for label in labels {
            for (prefix, owners) in &self.label_prefix_owners {
                if label.starts_with(prefix.as_str()) {
                    teams.extend(owners.iter().cloned());
                }
            }
        }

        for (team, members) in &self.team_members {
            if members.iter().any(|m| participants.contains(m)) {
                teams.insert(team.clone());
            }
        }

        teams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_ownership_contributes_teams() {
        let mut registry = OwnershipRegistry::default();
        registry
            .project_owners
            .insert("ENG".to_string(), BTreeSet::from(["platform".to_string()]));

        let teams = registry.affected_teams(Some("ENG"), &[], &[], &BTreeSet::new());
        assert!(teams.contains("platform"));
    }

    #[test]
    fn label_prefix_ownership_matches_prefix_not_exact() {
        let mut registry = OwnershipRegistry::default();
        registry
            .label_prefix_owners
            .push(("area/billing".to_string(), BTreeSet::from(["billing-team".to_string()])));

        let labels = vec!["area/billing-invoices".to_string()];
        let teams = registry.affected_teams(None, &[], &labels, &BTreeSet::new());
        assert!(teams.contains("billing-team"));
    }

    #[test]
    fn participant_membership_contributes_team() {
        let mut registry = OwnershipRegistry::default();
        registry
            .team_members
            .insert("sre".to_string(), BTreeSet::from(["bob".to_string()]));

        let participants = BTreeSet::from(["bob".to_string()]);
        let teams = registry.affected_teams(None, &[], &[], &participants);
        assert!(teams.contains("sre"));
    }

    #[test]
    fn no_matches_yields_empty_set() {
        let registry = OwnershipRegistry::default();
        let teams = registry.affected_teams(Some("X"), &[], &[], &BTreeSet::new());
        assert!(teams.is_empty());
    }
}
