//! The smart batcher (§4.4): per-`(channel, kind-group)` grouping by
//! similarity, with size/time flush, burst detection, adaptive delay,
//! quiet-hours, and anti-spam rate limits. Grounded on
//! `MicroBatcher` (size-OR-time flush), generalized from one global
//! buffer to many independently-tracked keys, each carrying a
//! similarity centroid and a rolling arrival window instead of a bare
//! counter.

use std::collections::{HashMap, VecDeque};
use std::time::Duration as StdDuration;

use broker_core::{Decision, Urgency};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use crate::batch::{Batch, FlushTrigger};
use crate::config::BatcherConfig;
use crate::quiet::QuietHoursGate;

#[derive(Debug, Clone, Default)]
pub struct AddEffects {
    pub delivered_immediate: Option<Decision>,
    pub flushed: Vec<Batch>,
}

struct KeyState {
    open: Option<Batch>,
    centroid: Option<u64>,
    /// Rolling one-minute arrival timestamps, for burst detection.
    arrivals: VecDeque<DateTime<Utc>>,
    minute_window: VecDeque<DateTime<Utc>>,
    hour_window: VecDeque<DateTime<Utc>>,
    burst_backoff_applied: u32,
}

impl Default for KeyState {
    fn default() -> Self {
        Self {
            open: None,
            centroid: None,
            arrivals: VecDeque::new(),
            minute_window: VecDeque::new(),
            hour_window: VecDeque::new(),
            burst_backoff_applied: 0,
        }
    }
}

pub struct SmartBatcher {
    config: BatcherConfig,
    quiet: Box<dyn QuietHoursGate>,
    keys: HashMap<String, KeyState>,
}

fn to_chrono(d: StdDuration) -> ChronoDuration {
    ChronoDuration::from_std(d).unwrap_or(ChronoDuration::zero())
}

impl SmartBatcher {
    pub fn new(config: BatcherConfig, quiet: Box<dyn QuietHoursGate>) -> Self {
        Self { config, quiet, keys: HashMap::new() }
    }

    fn state_mut(&mut self, key: &str) -> &mut KeyState {
        self.keys.entry(key.to_string()).or_default()
    }

    fn prune_window(window: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>, span: ChronoDuration) {
        while let Some(front) = window.front() {
            if now - *front > span {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    fn new_batch(channel: &str, now: DateTime<Utc>, max_wait: ChronoDuration) -> Batch {
        Batch {
            batch_id: Uuid::new_v4().to_string(),
            channel: channel.to_string(),
            members: Vec::new(),
            opened_at: now,
            last_added_at: now,
            deadline_at: now + max_wait,
            reason: FlushTrigger::Deadline,
            overflow: false,
        }
    }

    fn recompute_deadline(
        max_wait: ChronoDuration,
        min_inter_arrival_grace: ChronoDuration,
        hard_ceiling: ChronoDuration,
        batch: &mut Batch,
    ) {
        let by_wait = batch.opened_at + max_wait;
        let by_grace = batch.last_added_at + min_inter_arrival_grace;
        let ceiling = batch.opened_at + hard_ceiling;
        batch.deadline_at = by_wait.max(by_grace).min(ceiling);
    }

    /// Add one decision, keyed by `(channel, kind_group)` joined with a
    /// separator that cannot appear in either component's source data.
    pub fn add(
        &mut self,
        channel: &str,
        kind_group: &str,
        similarity_hash: u64,
        urgency: Urgency,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> AddEffects {
        let key = format!("{channel}\u{0}{kind_group}");
        let mut effects = AddEffects::default();

        // Critical path: immediate delivery bypasses batching and rate
        // caps entirely (§4.4).
        if urgency >= self.config.immediate_threshold {
            let state = self.state_mut(&key);
            state.arrivals.push_back(now);
            Self::prune_window(&mut state.arrivals, now, ChronoDuration::minutes(1));
            if let Some(mut old) = state.open.take() {
                old.reason = FlushTrigger::ImmediateArrival;
                effects.flushed.push(old);
            }
            state.centroid = None;
            effects.delivered_immediate = Some(decision);
            return effects;
        }

        let quiet_until = self.quiet.quiet_until(channel, now);
        let rate_limited = self.is_rate_limited(&key, now);
        let max_wait = to_chrono(self.config.max_wait);
        let min_inter_arrival_grace = to_chrono(self.config.min_inter_arrival_grace);
        let hard_ceiling = to_chrono(self.config.hard_ceiling);
        let similarity_threshold = self.config.similarity_threshold;
        let max_batch_size = self.config.max_batch_size;

        let state = self.state_mut(&key);
        state.arrivals.push_back(now);
        Self::prune_window(&mut state.arrivals, now, ChronoDuration::minutes(1));
        state.minute_window.push_back(now);
        state.hour_window.push_back(now);

        let centroid_distance = state
            .centroid
            .map(|c| broker_core::hash::hamming_distance(c, similarity_hash));
        let dissimilar = centroid_distance.map(|d| d > similarity_threshold).unwrap_or(false);

        if dissimilar && !rate_limited {
            if let Some(mut old) = state.open.take() {
                old.reason = FlushTrigger::Dissimilar;
                effects.flushed.push(old);
            }
        }

        if state.open.is_none() {
            state.open = Some(Self::new_batch(channel, now, max_wait));
            state.centroid = Some(similarity_hash);
        }

        let batch = state.open.as_mut().unwrap();
        batch.members.push(decision);
        batch.last_added_at = now;
        if rate_limited {
            batch.overflow = true;
        }
        Self::recompute_deadline(max_wait, min_inter_arrival_grace, hard_ceiling, batch);

        if let Some(quiet_end) = quiet_until {
            if urgency < Urgency::Critical {
                batch.deadline_at = batch.deadline_at.max(quiet_end);
            }
        }

        if batch.len() >= max_batch_size {
            let mut flushed = self.keys.get_mut(&key).unwrap().open.take().unwrap();
            flushed.reason = FlushTrigger::SizeCap;
            self.keys.get_mut(&key).unwrap().centroid = None;
            effects.flushed.push(flushed);
        }

        effects
    }

    fn is_rate_limited(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let per_minute = self.config.rate_limit_per_minute;
        let per_hour = self.config.rate_limit_per_hour;
        let state = self.state_mut(key);
        Self::prune_window(&mut state.minute_window, now, ChronoDuration::minutes(1));
        Self::prune_window(&mut state.hour_window, now, ChronoDuration::hours(1));
        state.minute_window.len() as u32 >= per_minute || state.hour_window.len() as u32 >= per_hour
    }

    /// Periodic sweep: flush any batch whose deadline has passed, and
    /// apply burst-cooldown deadline extension to batches whose key is
    /// currently bursting.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Batch> {
        let burst_threshold = self.config.burst_threshold;
        let backoff_factor = self.config.burst_backoff_factor;
        let hard_ceiling = to_chrono(self.config.hard_ceiling);
        let mut flushed = Vec::new();

        for state in self.keys.values_mut() {
            Self::prune_window(&mut state.arrivals, now, ChronoDuration::minutes(1));
            let bursting = state.arrivals.len() as u32 > burst_threshold;

            if let Some(batch) = state.open.as_mut() {
                if bursting && now >= batch.deadline_at {
                    state.burst_backoff_applied += 1;
                    let extension_secs = (batch.deadline_at - batch.opened_at).num_seconds() as f64
                        * (backoff_factor.powi(state.burst_backoff_applied as i32) - 1.0);
                    let extended = batch.deadline_at + ChronoDuration::seconds(extension_secs.max(1.0) as i64);
                    batch.deadline_at = extended.min(batch.opened_at + hard_ceiling);
                    continue;
                }

                if now >= batch.deadline_at {
                    let mut done = state.open.take().unwrap();
                    done.reason = if bursting { FlushTrigger::BurstCooldown } else { FlushTrigger::Deadline };
                    state.centroid = None;
                    state.burst_backoff_applied = 0;
                    flushed.push(done);
                }
            } else {
                state.burst_backoff_applied = 0;
            }
        }

        flushed
    }

    pub fn flush(&mut self, channel: &str, kind_group: &str) -> Option<Batch> {
        let key = format!("{channel}\u{0}{kind_group}");
        let state = self.keys.get_mut(&key)?;
        let mut batch = state.open.take()?;
        batch.reason = FlushTrigger::ExplicitFlush;
        state.centroid = None;
        Some(batch)
    }

    /// Drain every open batch, for graceful shutdown (§4.4 invariant:
    /// nothing is lost on graceful shutdown).
    pub fn drain(&mut self) -> Vec<Batch> {
        let mut out = Vec::new();
        for state in self.keys.values_mut() {
            if let Some(mut batch) = state.open.take() {
                batch.reason = FlushTrigger::Shutdown;
                out.push(batch);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiet::NeverQuiet;

    fn decision(id: &str) -> Decision {
        Decision::immediate(id, "eng-alerts", Urgency::Low, "test")
    }

    fn batcher(config: BatcherConfig) -> SmartBatcher {
        SmartBatcher::new(config, Box::new(NeverQuiet))
    }

    #[test]
    fn immediate_urgency_bypasses_batching() {
        let mut batcher = batcher(BatcherConfig::default());
        let effects = batcher.add("ch", "issue", 0, Urgency::Critical, decision("e1"), Utc::now());
        assert!(effects.delivered_immediate.is_some());
        assert!(effects.flushed.is_empty());
    }

    #[test]
    fn immediate_flushes_open_batch_first() {
        let mut batcher = batcher(BatcherConfig::default());
        let now = Utc::now();
        batcher.add("ch", "issue", 1, Urgency::Low, decision("e1"), now);
        let effects = batcher.add("ch", "issue", 1, Urgency::Critical, decision("e2"), now);
        assert!(effects.delivered_immediate.is_some());
        assert_eq!(effects.flushed.len(), 1);
        assert_eq!(effects.flushed[0].members.len(), 1);
    }

    #[test]
    fn size_cap_flushes_batch() {
        let mut config = BatcherConfig::default();
        config.max_batch_size = 2;
        let mut batcher = batcher(config);
        let now = Utc::now();
        batcher.add("ch", "issue", 1, Urgency::Low, decision("e1"), now);
        let effects = batcher.add("ch", "issue", 1, Urgency::Low, decision("e2"), now);
        assert_eq!(effects.flushed.len(), 1);
        assert_eq!(effects.flushed[0].len(), 2);
    }

    #[test]
    fn dissimilar_event_opens_new_batch() {
        let mut batcher = batcher(BatcherConfig::default());
        let now = Utc::now();
        batcher.add("ch", "issue", 0b0000, Urgency::Low, decision("e1"), now);
        let effects = batcher.add("ch", "issue", 0xFFFF_FFFF_FFFF_FFFF, Urgency::Low, decision("e2"), now);
        assert_eq!(effects.flushed.len(), 1);
        assert_eq!(effects.flushed[0].members.len(), 1);
    }

    #[test]
    fn tick_flushes_past_deadline() {
        let mut config = BatcherConfig::default();
        config.max_wait = StdDuration::from_secs(60);
        let mut batcher = batcher(config);
        let now = Utc::now();
        batcher.add("ch", "issue", 1, Urgency::Low, decision("e1"), now);
        let flushed = batcher.tick(now + ChronoDuration::seconds(120));
        assert_eq!(flushed.len(), 1);
    }

    #[test]
    fn drain_returns_all_open_batches() {
        let mut batcher = batcher(BatcherConfig::default());
        let now = Utc::now();
        batcher.add("ch1", "issue", 1, Urgency::Low, decision("e1"), now);
        batcher.add("ch2", "issue", 1, Urgency::Low, decision("e2"), now);
        let drained = batcher.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|b| b.reason == FlushTrigger::Shutdown));
    }
}
