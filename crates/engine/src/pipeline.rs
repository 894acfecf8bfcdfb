//! The L0→L9 pipeline (§2, §5 data flow): one `process_webhook` call
//! per inbound event, fanning out per affected team, through dedup,
//! rules, workload, batching/scheduling/threading, to dispatch and the
//! execution log.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use broker_batcher::SmartBatcher;
use broker_config::{ConfigLoader, TeamConfig};
use broker_core::ownership::OwnershipResolver;
use broker_core::raw::RawWebhook;
use broker_core::{classify, BrokerError, Decision, Disposition, Event, ExecutionRecord, Urgency};
use broker_dedup::{DedupStore, Observation};
use broker_dispatch::{DispatchRequest, Dispatcher};
use broker_execlog::ExecutionLog;
use broker_notify::Notification;
use broker_rules::{EvalOutcome, RuleSet};
use broker_scheduler::{Scheduler, SchedulingOutcome};
use broker_threading::{ThreadInputs, ThreadManager};
use broker_workload::{RiskLevel, WorkloadAnalyzer};
use chrono::{DateTime, Utc};

use crate::quiet::ConfigQuietHoursGate;

/// Everything the engine assembles at startup and hands to the
/// pipeline. Kept as a plain settings struct rather than scattering
/// constructor arguments (`startup::build_state`'s shape).
pub struct PipelineSettings {
    pub config: Arc<ConfigLoader>,
    pub ownership: Arc<dyn OwnershipResolver>,
    pub dedup: DedupStore,
    pub workload: WorkloadAnalyzer,
    pub batcher: SmartBatcher,
    pub quiet_gate: Arc<ConfigQuietHoursGate>,
    pub scheduler: Scheduler,
    pub threading: ThreadManager,
    pub dispatcher: Arc<Dispatcher>,
    pub execlog: Arc<ExecutionLog>,
}

struct CompiledRules {
    version: u64,
    set: Arc<RuleSet>,
}

/// One routing target produced by rule evaluation or the fallback
/// default-channel mapping: a destination channel, the hook that owns
/// it (selects the transport), and the effective urgency.
struct RouteTarget {
    channel: String,
    hook_id: String,
    urgency: Urgency,
}

pub struct Pipeline {
    config: Arc<ConfigLoader>,
    ownership: Arc<dyn OwnershipResolver>,
    dedup: DedupStore,
    rule_cache: Mutex<HashMap<String, CompiledRules>>,
    workload: WorkloadAnalyzer,
    batcher: Mutex<SmartBatcher>,
    quiet_gate: Arc<ConfigQuietHoursGate>,
    scheduler: Scheduler,
    threading: ThreadManager,
    dispatcher: Arc<Dispatcher>,
    execlog: Arc<ExecutionLog>,
    /// `channel -> (team_id, hook_id)` of the most recent route to that
    /// channel, so the batch-tick and digest-flush background tasks
    /// can dispatch without an `Event` in hand.
    channel_routes: Mutex<HashMap<String, (String, String)>>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            config: settings.config,
            ownership: settings.ownership,
            dedup: settings.dedup,
            rule_cache: Mutex::new(HashMap::new()),
            workload: settings.workload,
            batcher: Mutex::new(settings.batcher),
            quiet_gate: settings.quiet_gate,
            scheduler: settings.scheduler,
            threading: settings.threading,
            dispatcher: settings.dispatcher,
            execlog: settings.execlog,
            channel_routes: Mutex::new(HashMap::new()),
        }
    }

    /// The pipeline's single entrypoint (§2 data flow): classify, dedup,
    /// route per affected team, and deliver. Returns every
    /// `ExecutionRecord` produced by an immediate dispatch; decisions
    /// that were batched or scheduled for later produce no record yet.
    pub async fn process_webhook(&self, raw: RawWebhook, now: DateTime<Utc>) -> Result<Vec<ExecutionRecord>, BrokerError> {
        let event = classify::classify(raw, self.ownership.as_ref(), now)?;

        match self.dedup.observe(&event, now) {
            Observation::Duplicate { previous_seen_at } => {
                tracing::debug!(event_id = %event.id, %previous_seen_at, "duplicate event suppressed");
                return Ok(Vec::new());
            }
            Observation::New | Observation::Supersedes { .. } => {}
        }

        let mut records = Vec::new();
        for team_id in event.affected_teams.clone() {
            let Ok(config) = self.config.load(&team_id) else {
                tracing::warn!(%team_id, "affected team has no active config, dropping route");
                continue;
            };

            for target in self.route_for_team(&event, &config) {
                self.quiet_gate.register(&target.channel, &team_id);
                self.handle_target(&event, &config, target, now, &mut records).await;
            }

            self.check_workload_warning(&event, &config, now, &mut records).await;
        }

        Ok(records)
    }

    fn compiled_rules(&self, config: &TeamConfig) -> Option<Arc<RuleSet>> {
        let mut cache = self.rule_cache.lock().expect("rule cache lock poisoned");
        if let Some(entry) = cache.get(&config.team_id) {
            if entry.version == config.version {
                return Some(entry.set.clone());
            }
        }
        match RuleSet::compile(config.rules.clone()) {
            Ok(set) => {
                let set = Arc::new(set);
                cache.insert(
                    config.team_id.clone(),
                    CompiledRules { version: config.version, set: set.clone() },
                );
                Some(set)
            }
            Err(e) => {
                tracing::error!(team_id = %config.team_id, error = %e, "rule compilation failed, falling back to default channel");
                None
            }
        }
    }

    /// §4.1 algorithm plus its §4.1 failure-semantics fallback: a
    /// missing/uncompilable ruleset, or no matching rule, routes to
    /// the team's default channel for the event's category.
    fn route_for_team(&self, event: &Event, config: &TeamConfig) -> Vec<RouteTarget> {
        let Some(rule_set) = self.compiled_rules(config) else {
            return self.default_route(event, config);
        };

        let (outcome, warnings) = rule_set.evaluate(event);
        for warning in warnings {
            tracing::warn!(
                rule_id = %warning.rule_id,
                field = %warning.field,
                message = %warning.message,
                "rule evaluation warning"
            );
        }

        match outcome {
            EvalOutcome::Suppressed { reason } => {
                tracing::info!(event_id = %event.id, team_id = %config.team_id, %reason, "event suppressed by rule");
                Vec::new()
            }
            EvalOutcome::Routed(channels) => channels
                .into_iter()
                .map(|c| RouteTarget {
                    channel: c.channel,
                    hook_id: c.hook_id,
                    urgency: c.urgency_override.unwrap_or(event.classification.urgency),
                })
                .collect(),
            EvalOutcome::NoMatch => self.default_route(event, config),
        }
    }

    fn default_route(&self, event: &Event, config: &TeamConfig) -> Vec<RouteTarget> {
        let category = event.classification.category.as_str();
        config
            .default_channels
            .get(category)
            .map(|channel| {
                vec![RouteTarget {
                    channel: channel.clone(),
                    hook_id: String::new(),
                    urgency: event.classification.urgency,
                }]
            })
            .unwrap_or_default()
    }

    fn transport_for<'a>(&self, config: &'a TeamConfig, hook_id: &str) -> &'a str {
        config
            .hooks
            .get(hook_id)
            .map(|hook| hook.rendering_type.as_str())
            .unwrap_or("stdout")
    }

    fn idempotent_for(&self, config: &TeamConfig, hook_id: &str) -> bool {
        config.hooks.get(hook_id).map(|hook| hook.idempotent).unwrap_or(false)
    }

    /// One routed target through thread-binding, work-hours scheduling,
    /// and smart batching (§5 data flow: `{L4 | L5 | L8} → L6`).
    async fn handle_target(
        &self,
        event: &Event,
        config: &TeamConfig,
        target: RouteTarget,
        now: DateTime<Utc>,
        records: &mut Vec<ExecutionRecord>,
    ) {
        let thread_key = self.threading.thread_key_for(&ThreadInputs {
            channel: target.channel.clone(),
            subject_key: event.subject_key.clone(),
            kind_category: event.classification.category.clone(),
            similarity_hash: event.similarity_hash,
            at: now,
        });

        let decision = Decision {
            event_id: event.id.clone(),
            target_channel: target.channel.clone(),
            thread_key: Some(thread_key.clone()),
            disposition: Disposition::Immediate,
            reason: if target.hook_id.is_empty() {
                "default channel, no rule matched".to_string()
            } else {
                format!("routed via hook {}", target.hook_id)
            },
            urgency: target.urgency,
            scheduled_at: None,
            batch_id: None,
        };

        let outcome = self.scheduler.schedule(
            &target.channel,
            event.subject_key.as_deref(),
            decision.clone(),
            target.urgency,
            &config.work_hours,
            now,
        );

        match outcome {
            SchedulingOutcome::Scheduled { .. } => {
                // Persisted by the scheduler; nothing to dispatch now.
            }
            SchedulingOutcome::Immediate | SchedulingOutcome::Superseded { .. } => {
                self.deliver_immediate(event, config, &target, decision, &thread_key, now, records).await;
            }
        }
    }

    async fn deliver_immediate(
        &self,
        event: &Event,
        config: &TeamConfig,
        target: &RouteTarget,
        decision: Decision,
        thread_key: &str,
        now: DateTime<Utc>,
        records: &mut Vec<ExecutionRecord>,
    ) {
        let effects = {
            let mut batcher = self.batcher.lock().expect("batcher lock poisoned");
            batcher.add(
                &target.channel,
                &event.classification.category,
                event.similarity_hash,
                target.urgency,
                decision,
                now,
            )
        };

        self.channel_routes
            .lock()
            .expect("channel routes lock poisoned")
            .insert(target.channel.clone(), (config.team_id.clone(), target.hook_id.clone()));

        if let Some(immediate) = effects.delivered_immediate {
            let record = self.dispatch_decision(config, target, &immediate, thread_key).await;
            records.push(record);
        }

        for batch in effects.flushed {
            let record = self.dispatch_batch(config, target, &batch, thread_key).await;
            records.push(record);
        }
    }

    async fn dispatch_decision(&self, config: &TeamConfig, target: &RouteTarget, decision: &Decision, thread_key: &str) -> ExecutionRecord {
        let notification = render_decision(decision, thread_key);
        self.dispatch_notification(&decision.event_id, config, target, notification).await
    }

    async fn dispatch_batch(&self, config: &TeamConfig, target: &RouteTarget, batch: &broker_batcher::Batch, thread_key: &str) -> ExecutionRecord {
        let notification = render_batch(batch, thread_key);
        self.dispatch_notification(&batch.batch_id, config, target, notification).await
    }

    async fn dispatch_notification(
        &self,
        event_id: &str,
        config: &TeamConfig,
        target: &RouteTarget,
        notification: Notification,
    ) -> ExecutionRecord {
        let transport = self.transport_for(config, &target.hook_id).to_string();
        let request = DispatchRequest {
            event_id: event_id.to_string(),
            hook_id: target.hook_id.clone(),
            team_id: config.team_id.clone(),
            notification,
            idempotent: self.idempotent_for(config, &target.hook_id),
        };
        let record = self.dispatcher.dispatch(&transport, request).await;
        if let Err(e) = self.execlog.append(&record).await {
            tracing::warn!(execution_id = %record.execution_id, error = %e, "failed to append execution record");
        }
        record
    }

    /// Periodic batch-deadline sweep (§4.4): dispatches every batch
    /// whose deadline has passed. Called from the engine's background
    /// tick task, grounded on the fixed-interval tick loop.
    pub async fn tick_batches(&self, now: DateTime<Utc>) {
        let flushed = self.batcher.lock().expect("batcher lock poisoned").tick(now);
        for batch in flushed {
            let channel = batch.channel.clone();
            self.dispatch_routed_batch(&channel, batch, "").await;
        }
    }

    /// Flushes every recipient's due morning digest (§4.5) and
    /// dispatches the resulting decisions. Recipients are discovered
    /// from the scheduler's persisted entries, scoped to channels this
    /// pipeline has already routed to at least once.
    pub async fn flush_due_digests(&self, now: DateTime<Utc>) {
        let channels: Vec<String> = {
            let routes = self.channel_routes.lock().expect("channel routes lock poisoned");
            routes.keys().cloned().collect()
        };

        for channel in channels {
            let Some((team_id, hook_id)) = self.channel_routes.lock().expect("channel routes lock poisoned").get(&channel).cloned() else {
                continue;
            };
            let Ok(config) = self.config.load(&team_id) else { continue };
            let Some(decisions) = self.scheduler.flush_due_digest(&channel, &config.work_hours, now) else {
                continue;
            };
            if decisions.is_empty() {
                continue;
            }

            let target = RouteTarget { channel: channel.clone(), hook_id, urgency: Urgency::Low };
            for decision in decisions {
                let record = self.dispatch_decision(&config, &target, &decision, "").await;
                tracing::debug!(execution_id = %record.execution_id, %channel, "digest entry dispatched");
            }
        }
    }

    /// Dispatches one already-flushed batch using the team/hook this
    /// channel was last routed through.
    async fn dispatch_routed_batch(&self, channel: &str, batch: broker_batcher::Batch, thread_key: &str) {
        let Some((team_id, hook_id)) = self.channel_routes.lock().expect("channel routes lock poisoned").get(channel).cloned() else {
            tracing::warn!(%channel, "flushed batch for a channel with no known route, dropping");
            return;
        };
        let Ok(config) = self.config.load(&team_id) else {
            tracing::warn!(%team_id, "flushed batch's team has no active config, dropping");
            return;
        };
        let target = RouteTarget { channel: channel.to_string(), hook_id, urgency: Urgency::Low };
        self.dispatch_batch(&config, &target, &batch, thread_key).await;
    }

    /// Sweeps the dead-letter queue of entries past their retention
    /// window (§4.6).
    pub fn sweep_dead_letters(&self) {
        self.dispatcher.sweep_dead_letters();
    }

    /// Drops every dedup entry of the given kind category, for
    /// `broker-cli dedup purge --kind <k>`.
    pub fn purge_dedup(&self, kind: &str) -> usize {
        self.dedup.purge_kind(kind)
    }

    /// Flushes every open batch immediately, for `broker-cli drain`
    /// (§5 shutdown lifecycle: "nothing is lost on graceful shutdown").
    /// Persisted scheduled entries are left untouched — they survive
    /// restart via `Scheduler::restore_pending`.
    pub async fn drain(&self) -> usize {
        let batches = self.batcher.lock().expect("batcher lock poisoned").drain();
        let mut dispatched = 0;
        for batch in batches {
            let channel = batch.channel.clone();
            self.dispatch_routed_batch(&channel, batch, "").await;
            dispatched += 1;
        }
        dispatched
    }

    /// Every execution record started within `[from, to]`, across every
    /// hook this pipeline has routed through, for `broker-cli replay`.
    pub async fn replay(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ExecutionRecord> {
        let hooks: std::collections::HashSet<String> = {
            let routes = self.channel_routes.lock().expect("channel routes lock poisoned");
            routes.values().map(|(_, hook_id)| hook_id.clone()).filter(|h| !h.is_empty()).collect()
        };

        let mut records = Vec::new();
        for hook_id in hooks {
            match self.execlog.by_hook(&hook_id, Some(from)).await {
                Ok(rows) => records.extend(rows.into_iter().filter(|r| r.started_at <= to)),
                Err(e) => tracing::warn!(%hook_id, error = %e, "failed to read execution log for replay"),
            }
        }
        records.sort_by_key(|r| r.started_at);
        records
    }

    /// Drops execution-log rows past retention for every hook this
    /// pipeline knows about (§4.7).
    pub async fn sweep_execution_log(&self, now: DateTime<Utc>) {
        let hooks: std::collections::HashSet<String> = {
            let routes = self.channel_routes.lock().expect("channel routes lock poisoned");
            routes.values().map(|(_, hook_id)| hook_id.clone()).filter(|h| !h.is_empty()).collect()
        };
        for hook_id in hooks {
            if let Err(e) = self.execlog.sweep_retention(&hook_id, now).await {
                tracing::warn!(%hook_id, error = %e, "execution log retention sweep failed");
            }
        }
    }

    /// §4.3: a risk escalation above `high` appends a workload-warning
    /// decision on a channel distinct from the main one. The team's
    /// `default_channels["workload_warning"]` slot holds that target,
    /// falling back to the escalation channel.
    async fn check_workload_warning(&self, event: &Event, config: &TeamConfig, now: DateTime<Utc>, records: &mut Vec<ExecutionRecord>) {
        let warning_channel = config
            .default_channels
            .get("workload_warning")
            .cloned()
            .unwrap_or_else(|| config.escalation_channel.clone());

        let thread_key = self.threading.thread_key_for(&ThreadInputs {
            channel: warning_channel.clone(),
            subject_key: event.subject_key.clone(),
            kind_category: event.classification.category.clone(),
            similarity_hash: event.similarity_hash,
            at: now,
        });

        for assignee in &event.assignees {
            let snapshot = self.workload.score(assignee, now);
            if snapshot.risk != RiskLevel::Critical {
                continue;
            }

            let decision = Decision {
                event_id: event.id.clone(),
                target_channel: warning_channel.clone(),
                thread_key: Some(thread_key.clone()),
                disposition: Disposition::Escalated,
                reason: format!("workload risk critical for {assignee}"),
                urgency: Urgency::High,
                scheduled_at: None,
                batch_id: None,
            };

            let target = RouteTarget { channel: warning_channel.clone(), hook_id: String::new(), urgency: Urgency::High };
            let record = self.dispatch_decision(config, &target, &decision, &thread_key).await;
            records.push(record);
        }
    }
}

/// Minimal renderer (§6 rendering interface, trimmed to this spec's
/// scope: no templating layer, just enough structure for a transport
/// to act on). Lives here rather than in `broker-notify` since it
/// needs `Decision`/`Batch` shapes from both the core and batcher
/// crates.
fn render_decision(decision: &Decision, thread_key: &str) -> Notification {
    let mut metadata = HashMap::new();
    metadata.insert("channel_id".to_string(), decision.target_channel.clone());
    metadata.insert("disposition".to_string(), format!("{:?}", decision.disposition));
    if !thread_key.is_empty() {
        metadata.insert("thread_key".to_string(), thread_key.to_string());
    }

    Notification {
        subject: format!("[{:?}] {}", decision.urgency, decision.target_channel),
        body: decision.reason.clone(),
        metadata,
    }
}

fn render_batch(batch: &broker_batcher::Batch, thread_key: &str) -> Notification {
    let mut metadata = HashMap::new();
    metadata.insert("channel_id".to_string(), batch.channel.clone());
    metadata.insert("batch_id".to_string(), batch.batch_id.clone());
    metadata.insert("member_count".to_string(), batch.len().to_string());
    if !thread_key.is_empty() {
        metadata.insert("thread_key".to_string(), thread_key.to_string());
    }

    Notification {
        subject: format!("{} updates in {}", batch.len(), batch.channel),
        body: batch
            .members
            .iter()
            .map(|m| m.reason.as_str())
            .collect::<Vec<_>>()
            .join("\n"),
        metadata,
    }
}
