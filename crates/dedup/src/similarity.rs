//! Near-duplicate querying helpers layered on `DedupStore::near_duplicates`
//! (§4.2: content that is not byte-identical but close enough in the
//! simhash space to be worth flagging to the batcher/threading layers).

use crate::entry::DedupKey;
use crate::store::DedupStore;

/// Default Hamming-distance threshold below which two simhashes are
/// treated as near-duplicates. Tuned for the 64-bit simhash width:
/// a handful of differing bits out of 64 still corresponds to near-
/// identical tokenized text.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 6;

pub fn find_near_duplicates(store: &DedupStore, hash: u64) -> Vec<DedupKey> {
    store.near_duplicates(hash, DEFAULT_SIMILARITY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::classify::classify;
    use broker_core::ownership::NullOwnershipResolver;
    use broker_core::raw::RawWebhook;
    use broker_core::EventSource;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn event_for(subject: &str, body: &str) -> broker_core::Event {
        let raw = RawWebhook {
            source: EventSource::IssueTracker,
            raw_kind: "issue.comment_added".to_string(),
            fields: serde_json::Map::new(),
            subject_key: Some(subject.to_string()),
            title: None,
            body: Some(body.to_string()),
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
        classify(raw, &NullOwnershipResolver, Utc::now()).unwrap()
    }

    #[test]
    fn near_duplicate_text_is_found() {
        let store = DedupStore::new(1000, 3600);
        let now = Utc::now();
        let e1 = event_for("PR-1", "Deploy failed on staging at 10:02:31");
        let e2 = event_for("PR-2", "Deploy failed on staging at 10:02:45");
        store.observe(&e1, now);
        store.observe(&e2, now);

        let matches = find_near_duplicates(&store, e1.similarity_hash);
        assert!(matches.iter().any(|k| k.subject_key.as_deref() == Some("PR-2")));
    }
}
