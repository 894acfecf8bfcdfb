//! Thread-key resolution and binding (§4.8): entity-based, then
//! content-similarity, then temporal proximity, preferring the
//! strategy that most specifically identifies "the same conversation".
//! Grounded on the dedup store's lazy-expiry map pattern, generalised
//! from "same content" to "same ongoing conversation".

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use broker_core::hash::hamming_distance;

use crate::types::{ThreadInputs, ThreadState};

pub const DEFAULT_IDLE_EXPIRY_SECS: i64 = 24 * 60 * 60;
pub const DEFAULT_CONTENT_WINDOW_SECS: i64 = 30 * 60;
pub const DEFAULT_TEMPORAL_WINDOW_SECS: i64 = 5 * 60;
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 6;

#[derive(Debug, Clone)]
pub struct ThreadingConfig {
    pub idle_expiry_secs: i64,
    pub content_window_secs: i64,
    pub temporal_window_secs: i64,
    pub similarity_threshold: u32,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            idle_expiry_secs: DEFAULT_IDLE_EXPIRY_SECS,
            content_window_secs: DEFAULT_CONTENT_WINDOW_SECS,
            temporal_window_secs: DEFAULT_TEMPORAL_WINDOW_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

pub struct ThreadManager {
    config: ThreadingConfig,
    threads: Mutex<HashMap<String, ThreadState>>,
    /// `(channel, subject_key) -> thread_key`, the entity-based index.
    by_entity: Mutex<HashMap<(String, String), String>>,
}

impl ThreadManager {
    pub fn new(config: ThreadingConfig) -> Self {
        Self {
            config,
            threads: Mutex::new(HashMap::new()),
            by_entity: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the thread key for `inputs`, creating a new thread if
    /// no active one matches under any strategy. Expired threads are
    /// swept lazily as part of this call.
    pub fn thread_key_for(&self, inputs: &ThreadInputs) -> String {
        let mut threads = self.threads.lock().expect("threads lock poisoned");
        let mut by_entity = self.by_entity.lock().expect("entity index lock poisoned");
        self.sweep_locked(&mut threads, &mut by_entity, inputs.at);

        if let Some(subject_key) = &inputs.subject_key {
            let entity_key = (inputs.channel.clone(), subject_key.clone());
            if let Some(thread_key) = by_entity.get(&entity_key) {
                if let Some(state) = threads.get_mut(thread_key) {
                    state.last_activity = inputs.at;
                    return thread_key.clone();
                }
            }
            let thread_key = self.new_thread(&mut threads, inputs);
            by_entity.insert(entity_key, thread_key.clone());
            return thread_key;
        }

        if let Some(thread_key) = find_content_match(&threads, inputs, &self.config) {
            if let Some(state) = threads.get_mut(&thread_key) {
                state.last_activity = inputs.at;
            }
            return thread_key;
        }

        if let Some(thread_key) = find_temporal_match(&threads, inputs, &self.config) {
            if let Some(state) = threads.get_mut(&thread_key) {
                state.last_activity = inputs.at;
            }
            return thread_key;
        }

        self.new_thread(&mut threads, inputs)
    }

    /// Records that an outgoing message was sent under `thread_key`.
    pub fn bind(&self, thread_key: &str, message_id: impl Into<String>) {
        let mut threads = self.threads.lock().expect("threads lock poisoned");
        if let Some(state) = threads.get_mut(thread_key) {
            state.bound_messages.push(message_id.into());
        }
    }

    pub fn len(&self) -> usize {
        self.threads.lock().expect("threads lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_thread(&self, threads: &mut HashMap<String, ThreadState>, inputs: &ThreadInputs) -> String {
        let thread_key = Uuid::new_v4().to_string();
        threads.insert(
            thread_key.clone(),
            ThreadState {
                thread_key: thread_key.clone(),
                channel: inputs.channel.clone(),
                subject_key: inputs.subject_key.clone(),
                kind_category: inputs.kind_category.clone(),
                similarity_hash: inputs.similarity_hash,
                last_activity: inputs.at,
                bound_messages: Vec::new(),
            },
        );
        thread_key
    }

    fn sweep_locked(
        &self,
        threads: &mut HashMap<String, ThreadState>,
        by_entity: &mut HashMap<(String, String), String>,
        now: DateTime<Utc>,
    ) {
        let expiry = chrono::Duration::seconds(self.config.idle_expiry_secs);
        threads.retain(|_, state| now - state.last_activity < expiry);
        by_entity.retain(|_, thread_key| threads.contains_key(thread_key));
    }
}

fn find_content_match(threads: &HashMap<String, ThreadState>, inputs: &ThreadInputs, config: &ThreadingConfig) -> Option<String> {
    let window = chrono::Duration::seconds(config.content_window_secs);
    threads
        .values()
        .filter(|s| s.channel == inputs.channel)
        .filter(|s| inputs.at - s.last_activity < window)
        .find(|s| hamming_distance(s.similarity_hash, inputs.similarity_hash) <= config.similarity_threshold)
        .map(|s| s.thread_key.clone())
}

fn find_temporal_match(threads: &HashMap<String, ThreadState>, inputs: &ThreadInputs, config: &ThreadingConfig) -> Option<String> {
    let window = chrono::Duration::seconds(config.temporal_window_secs);
    threads
        .values()
        .filter(|s| s.channel == inputs.channel && s.kind_category == inputs.kind_category)
        .filter(|s| inputs.at - s.last_activity < window)
        .map(|s| s.thread_key.clone())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(channel: &str, subject_key: Option<&str>, kind: &str, hash: u64, at: DateTime<Utc>) -> ThreadInputs {
        ThreadInputs {
            channel: channel.to_string(),
            subject_key: subject_key.map(|s| s.to_string()),
            kind_category: kind.to_string(),
            similarity_hash: hash,
            at,
        }
    }

    #[test]
    fn entity_based_reuses_thread_across_lifecycle() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("eng", Some("ENG-42"), "issue", 0, now));
        let k2 = manager.thread_key_for(&inputs("eng", Some("ENG-42"), "issue", 99, now + chrono::Duration::minutes(10)));
        assert_eq!(k1, k2);
    }

    #[test]
    fn different_entities_get_different_threads() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("eng", Some("ENG-42"), "issue", 0, now));
        let k2 = manager.thread_key_for(&inputs("eng", Some("ENG-43"), "issue", 0, now));
        assert_ne!(k1, k2);
    }

    #[test]
    fn content_similarity_binds_entity_less_events() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("ops", None, "alert", 0b1010, now));
        let k2 = manager.thread_key_for(&inputs("ops", None, "alert", 0b1011, now + chrono::Duration::minutes(5)));
        assert_eq!(k1, k2);
    }

    #[test]
    fn temporal_proximity_binds_when_no_entity_or_similarity_match() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("ops", None, "deployment", 0, now));
        let k2 = manager.thread_key_for(&inputs("ops", None, "deployment", u64::MAX, now + chrono::Duration::minutes(2)));
        assert_eq!(k1, k2);
    }

    #[test]
    fn idle_thread_expires_and_a_new_one_starts() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("eng", Some("ENG-1"), "issue", 0, now));
        let later = now + chrono::Duration::hours(25);
        let k2 = manager.thread_key_for(&inputs("eng", Some("ENG-1"), "issue", 0, later));
        assert_ne!(k1, k2);
    }

    #[test]
    fn bind_records_message_id() {
        let manager = ThreadManager::new(ThreadingConfig::default());
        let now = Utc::now();
        let k1 = manager.thread_key_for(&inputs("eng", Some("ENG-1"), "issue", 0, now));
        manager.bind(&k1, "msg-1");
        let threads = manager.threads.lock().unwrap();
        assert_eq!(threads.get(&k1).unwrap().bound_messages, vec!["msg-1".to_string()]);
    }
}
