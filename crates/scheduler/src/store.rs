//! Persistence boundary for pending scheduled entries (§4.5
//! Durability). Kept trait-based and crate-local, the same
//! call-site-injected shape as `broker_core::ownership::OwnershipResolver`,
//! so this crate never depends on a concrete storage backend; a real
//! deployment wires a `broker-storage`-backed implementation in at the
//! engine layer.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::entry::ScheduledEntry;

pub trait ScheduleStore: Send + Sync {
    fn put(&self, entry: ScheduledEntry);
    fn remove_for_subject(&self, recipient_id: &str, subject_key: &str) -> usize;
    /// All entries for `recipient_id`, in insertion order.
    fn pending_for(&self, recipient_id: &str) -> Vec<ScheduledEntry>;
    fn clear_for(&self, recipient_id: &str);
    /// Every entry across every recipient, used to restore state on
    /// startup (§4.5 Durability).
    fn all(&self) -> Vec<ScheduledEntry>;
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    entries: Mutex<HashMap<String, Vec<ScheduledEntry>>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn put(&self, entry: ScheduledEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.entry(entry.recipient_id.clone()).or_default().push(entry);
    }

    fn remove_for_subject(&self, recipient_id: &str, subject_key: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let Some(list) = entries.get_mut(recipient_id) else {
            return 0;
        };
        let before = list.len();
        list.retain(|e| e.subject_key.as_deref() != Some(subject_key));
        before - list.len()
    }

    fn pending_for(&self, recipient_id: &str) -> Vec<ScheduledEntry> {
        self.entries.lock().unwrap().get(recipient_id).cloned().unwrap_or_default()
    }

    fn clear_for(&self, recipient_id: &str) {
        self.entries.lock().unwrap().remove(recipient_id);
    }

    fn all(&self) -> Vec<ScheduledEntry> {
        self.entries.lock().unwrap().values().flat_map(|v| v.iter().cloned()).collect()
    }
}
