//! Striped, TTL + LRU-bounded dedup store (§4.2). Grounded on
//! `storage::cache::SegmentCache`'s `LruCache` + `Mutex` + capacity
//! eviction shape, generalised from one global cache to `STRIPES`
//! independently-locked shards (§5: "dedup buckets: striped locks, no
//! global lock").

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use broker_core::{Event, EventSource};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;

use crate::entry::{DedupEntry, DedupKey};

const STRIPES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    New,
    Duplicate { previous_seen_at: DateTime<Utc> },
    /// The event's `(source, subject_key)` matched a prior entry but
    /// carried a different `content_hash`: the prior entry is marked
    /// superseded and this event is delivered, not suppressed.
    Supersedes { previous_content_hash: String },
}

struct Shard {
    by_key: LruCache<DedupKey, DedupEntry>,
    /// `(source, subject_key) -> content_hash` of the latest entry
    /// seen for that subject, for update-vs-duplicate detection.
    by_subject: HashMap<(EventSource, Option<String>), String>,
}

pub struct DedupStore {
    shards: Vec<Mutex<Shard>>,
    default_ttl: ChronoDuration,
    per_kind_ttl: HashMap<String, ChronoDuration>,
}

impl DedupStore {
    pub fn new(capacity: usize, default_ttl_secs: u64) -> Self {
        let per_shard_capacity =
            NonZeroUsize::new((capacity / STRIPES).max(1)).expect("capacity must be positive");
        let shards = (0..STRIPES)
            .map(|_| {
                Mutex::new(Shard {
                    by_key: LruCache::new(per_shard_capacity),
                    by_subject: HashMap::new(),
                })
            })
            .collect();
        Self {
            shards,
            default_ttl: ChronoDuration::seconds(default_ttl_secs as i64),
            per_kind_ttl: HashMap::new(),
        }
    }

    pub fn set_kind_ttl(&mut self, kind_category: impl Into<String>, ttl_secs: u64) {
        self.per_kind_ttl
            .insert(kind_category.into(), ChronoDuration::seconds(ttl_secs as i64));
    }

    fn ttl_for(&self, category: &str) -> ChronoDuration {
        self.per_kind_ttl.get(category).copied().unwrap_or(self.default_ttl)
    }

    fn shard_for(&self, key: &DedupKey) -> &Mutex<Shard> {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// `observe(content_hash, now) -> {new | duplicate, previous_seen_at?}`
    /// with atomic compare-and-insert semantics (§4.2).
    pub fn observe(&self, event: &Event, now: DateTime<Utc>) -> Observation {
        let key = DedupKey {
            source: event.source,
            subject_key: event.subject_key.clone(),
            content_hash: event.content_hash.clone(),
        };
        let ttl = self.ttl_for(&event.classification.category);
        let shard = self.shard_for(&key);
        let mut shard = shard.lock().unwrap();

        // Lazy sweep: drop this key's entry if it's past TTL so it
        // reads as new rather than a stale duplicate.
        if let Some(existing) = shard.by_key.peek(&key) {
            if existing.expires_at <= now {
                shard.by_key.pop(&key);
            }
        }

        if let Some(existing) = shard.by_key.get_mut(&key) {
            existing.count += 1;
            let previous_seen_at = existing.last_seen_at;
            existing.last_seen_at = now;
            existing.expires_at = now + ttl;
            return Observation::Duplicate { previous_seen_at };
        }

        let subject_identity = (event.source, event.subject_key.clone());
        let superseded_hash = shard.by_subject.get(&subject_identity).cloned();
        if let Some(prev_hash) = &superseded_hash {
            if *prev_hash != event.content_hash {
                let prev_key = DedupKey {
                    source: event.source,
                    subject_key: event.subject_key.clone(),
                    content_hash: prev_hash.clone(),
                };
                if let Some(prev_entry) = shard.by_key.get_mut(&prev_key) {
                    prev_entry.superseded = true;
                }
            }
        }

        shard.by_key.put(
            key.clone(),
            DedupEntry {
                key: key.clone(),
                similarity_hash: event.similarity_hash,
                first_seen_at: now,
                last_seen_at: now,
                count: 1,
                originating_event_id: event.id.clone(),
                kind_category: event.classification.category.clone(),
                expires_at: now + ttl,
                superseded: false,
            },
        );
        shard.by_subject.insert(subject_identity, event.content_hash.clone());

        match superseded_hash {
            Some(prev_hash) if prev_hash != event.content_hash => {
                Observation::Supersedes { previous_content_hash: prev_hash }
            }
            _ => Observation::New,
        }
    }

    /// Near-duplicate query over the similarity-hash secondary index:
    /// every currently-held entry within `max_distance` of `hash`.
    pub fn near_duplicates(&self, hash: u64, max_distance: u32) -> Vec<DedupKey> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().unwrap();
            for (key, entry) in shard.by_key.iter() {
                if broker_core::hash::hamming_distance(hash, entry.similarity_hash) <= max_distance {
                    out.push(key.clone());
                }
            }
        }
        out
    }

    /// Drops every held entry whose kind category matches, for the
    /// CLI's `dedup purge --kind <k>` operational surface.
    pub fn purge_kind(&self, category: &str) -> usize {
        let mut purged = 0;
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap();
            let stale: Vec<DedupKey> = shard
                .by_key
                .iter()
                .filter(|(_, entry)| entry.kind_category == category)
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                shard.by_key.pop(&key);
                let subject_identity = (key.source, key.subject_key.clone());
                if shard.by_subject.get(&subject_identity) == Some(&key.content_hash) {
                    shard.by_subject.remove(&subject_identity);
                }
                purged += 1;
            }
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().by_key.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_core::classify::classify;
    use broker_core::ownership::NullOwnershipResolver;
    use broker_core::raw::RawWebhook;
    use std::collections::BTreeSet;

    fn event_for(subject: &str, body: &str) -> Event {
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
    fn first_observation_is_new() {
        let store = DedupStore::new(1000, 3600);
        let event = event_for("PR-1", "identical body");
        assert_eq!(store.observe(&event, Utc::now()), Observation::New);
    }

    #[test]
    fn repeat_within_ttl_is_duplicate() {
        let store = DedupStore::new(1000, 3600);
        let event = event_for("PR-1", "identical body");
        let now = Utc::now();
        store.observe(&event, now);
        let outcome = store.observe(&event, now + ChronoDuration::seconds(40));
        assert!(matches!(outcome, Observation::Duplicate { .. }));
    }

    #[test]
    fn repeat_after_ttl_is_new_again() {
        let store = DedupStore::new(1000, 60);
        let event = event_for("PR-1", "identical body");
        let now = Utc::now();
        store.observe(&event, now);
        let outcome = store.observe(&event, now + ChronoDuration::seconds(120));
        assert_eq!(outcome, Observation::New);
    }

    #[test]
    fn same_subject_different_content_supersedes() {
        let store = DedupStore::new(1000, 3600);
        let now = Utc::now();
        let e1 = event_for("PR-1", "first comment");
        store.observe(&e1, now);

        let e2 = event_for("PR-1", "a totally different comment");
        let outcome = store.observe(&e2, now + ChronoDuration::seconds(10));
        assert!(matches!(outcome, Observation::Supersedes { .. }));
    }

    #[test]
    fn colliding_hash_different_subject_is_distinct() {
        // Same body text on two different subjects must be treated as
        // distinct even if (by construction) their content_hash were
        // to collide, because the logical key includes subject_key.
        let store = DedupStore::new(1000, 3600);
        let now = Utc::now();
        let e1 = event_for("PR-1", "same text");
        let e2 = event_for("PR-2", "same text");
        assert_eq!(store.observe(&e1, now), Observation::New);
        assert_eq!(store.observe(&e2, now), Observation::New);
    }

    #[test]
    fn purge_kind_drops_only_matching_category() {
        let store = DedupStore::new(1000, 3600);
        let now = Utc::now();
        let comment = event_for("PR-1", "a comment");
        store.observe(&comment, now);
        assert_eq!(comment.classification.category, "issue");

        let purged = store.purge_kind("issue");
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 0);

        let purged_again = store.purge_kind("issue");
        assert_eq!(purged_again, 0);
    }
}
