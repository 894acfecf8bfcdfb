//! The L5 scheduler (§4.5): per-recipient work-hours queueing,
//! timezone conversion, morning digest assembly, urgent bypass.

use std::sync::Arc;

use broker_core::workhours::WorkHoursSpec;
use broker_core::{Decision, Urgency};
use chrono::{DateTime, Utc};

use crate::entry::{ScheduledEntry, SchedulingOutcome};
use crate::store::ScheduleStore;
use crate::workhours::{is_within_work_hours, next_work_instant, with_jitter};

pub struct Scheduler {
    store: Arc<dyn ScheduleStore>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Maps one decision to immediate delivery or a scheduled digest
    /// slot, per §4.5's decision mapping.
    pub fn schedule(
        &self,
        recipient_id: &str,
        subject_key: Option<&str>,
        decision: Decision,
        urgency: Urgency,
        spec: &WorkHoursSpec,
        now: DateTime<Utc>,
    ) -> SchedulingOutcome {
        if urgency >= Urgency::Critical {
            let removed = match subject_key {
                Some(key) if spec.urgent_bypass => self.store.remove_for_subject(recipient_id, key),
                _ => 0,
            };
            if removed > 0 {
                return SchedulingOutcome::Superseded { removed };
            }
            return SchedulingOutcome::Immediate;
        }

        if is_within_work_hours(spec, now) {
            return SchedulingOutcome::Immediate;
        }

        let next = next_work_instant(spec, now);
        let jitter_seed = decision.event_id.bytes().map(u64::from).sum();
        let scheduled_at = with_jitter(next, jitter_seed);

        self.store.put(ScheduledEntry {
            recipient_id: recipient_id.to_string(),
            subject_key: subject_key.map(|s| s.to_string()),
            decision,
            scheduled_at,
        });

        SchedulingOutcome::Scheduled { scheduled_at }
    }

    /// Flush a recipient's held entries into a single morning digest
    /// once `now` enters their work window. Returns `None` if there is
    /// nothing pending or `now` is still outside work hours.
    pub fn flush_due_digest(&self, recipient_id: &str, spec: &WorkHoursSpec, now: DateTime<Utc>) -> Option<Vec<Decision>> {
        let pending = self.store.pending_for(recipient_id);
        if pending.is_empty() || !is_within_work_hours(spec, now) {
            return None;
        }
        self.store.clear_for(recipient_id);
        Some(pending.into_iter().map(|e| e.decision).collect())
    }

    /// All entries persisted across every recipient, for restoring
    /// scheduler state after a process restart (§4.5 Durability).
    pub fn restore_pending(&self) -> Vec<ScheduledEntry> {
        self.store.all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryScheduleStore;
    use broker_core::workhours::TimeInterval;
    use chrono::{NaiveTime, TimeZone, Weekday};
    use std::collections::HashMap;

    fn spec() -> WorkHoursSpec {
        let mut weekly = HashMap::new();
        weekly.insert(
            Weekday::Mon,
            vec![TimeInterval {
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }],
        );
        WorkHoursSpec { timezone: "UTC".to_string(), weekly, holidays: Vec::new(), pto: Vec::new(), urgent_bypass: true }
    }

    fn decision(id: &str) -> Decision {
        Decision::immediate(id, "eng-alerts", Urgency::Low, "test")
    }

    #[test]
    fn critical_urgency_is_always_immediate() {
        let scheduler = Scheduler::new(Arc::new(InMemoryScheduleStore::new()));
        let outcome = scheduler.schedule(
            "alice",
            Some("ENG-1"),
            decision("e1"),
            Urgency::Critical,
            &spec(),
            Utc.with_ymd_and_hms(2026, 8, 3, 20, 0, 0).unwrap(),
        );
        assert_eq!(outcome, SchedulingOutcome::Immediate);
    }

    #[test]
    fn off_hours_event_is_scheduled() {
        let scheduler = Scheduler::new(Arc::new(InMemoryScheduleStore::new()));
        let outcome = scheduler.schedule(
            "alice",
            Some("ENG-1"),
            decision("e1"),
            Urgency::Low,
            &spec(),
            Utc.with_ymd_and_hms(2026, 8, 3, 20, 0, 0).unwrap(),
        );
        assert!(matches!(outcome, SchedulingOutcome::Scheduled { .. }));
    }

    #[test]
    fn critical_event_supersedes_held_digest_for_subject() {
        let store = Arc::new(InMemoryScheduleStore::new());
        let scheduler = Scheduler::new(store.clone());
        let off_hours = Utc.with_ymd_and_hms(2026, 8, 3, 20, 0, 0).unwrap();
        scheduler.schedule("alice", Some("ENG-1"), decision("e1"), Urgency::Low, &spec(), off_hours);
        assert_eq!(store.pending_for("alice").len(), 1);

        let outcome = scheduler.schedule("alice", Some("ENG-1"), decision("e2"), Urgency::Critical, &spec(), off_hours);
        assert_eq!(outcome, SchedulingOutcome::Superseded { removed: 1 });
        assert_eq!(store.pending_for("alice").len(), 0);
    }

    #[test]
    fn digest_flushes_once_inside_work_hours() {
        let store = Arc::new(InMemoryScheduleStore::new());
        let scheduler = Scheduler::new(store);
        let off_hours = Utc.with_ymd_and_hms(2026, 8, 2, 20, 0, 0).unwrap();
        scheduler.schedule("alice", Some("ENG-1"), decision("e1"), Urgency::Low, &spec(), off_hours);
        scheduler.schedule("alice", Some("ENG-2"), decision("e2"), Urgency::Low, &spec(), off_hours);

        let still_off = scheduler.flush_due_digest("alice", &spec(), off_hours);
        assert!(still_off.is_none());

        let monday_noon = Utc.with_ymd_and_hms(2026, 8, 3, 12, 0, 0).unwrap();
        let digest = scheduler.flush_due_digest("alice", &spec(), monday_noon).unwrap();
        assert_eq!(digest.len(), 2);
    }
}
