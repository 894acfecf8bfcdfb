//! Team-ownership resolution boundary.
//!
//! The classifier (§4.0) derives `affected_teams` from project,
//! component, label, and participant ownership, but that ownership
//! mapping lives in team configuration (`broker-config`), which
//! depends on this crate rather than the other way around. Callers
//! hand the classifier an `OwnershipResolver` implementation instead.

use std::collections::BTreeSet;

/// Resolves the set of teams that own a piece of project/component/
/// label/participant context.
pub trait OwnershipResolver: Send + Sync {
    fn affected_teams(
        &self,
        project: Option<&str>,
        components: &[String],
        labels: &[String],
        participants: &BTreeSet<String>,
    ) -> BTreeSet<String>;
}

/// Resolver with no ownership data; every event resolves to no
/// affected teams. Used in unit tests and as a safe fallback when no
/// team registry is wired in yet.
pub struct NullOwnershipResolver;

impl OwnershipResolver for NullOwnershipResolver {
    fn affected_teams(
        &self,
        _project: Option<&str>,
        _components: &[String],
        _labels: &[String],
        _participants: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        BTreeSet::new()
    }
}
