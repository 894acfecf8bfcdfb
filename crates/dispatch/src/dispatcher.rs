//! Dispatch worker pool (§4.6): bounded concurrency across channels,
//! strict per-channel ordering, circuit breakers, retry-with-backoff
//! for transient failures, and recovery workflows for everything else.
//! Grounded on the `notify::Dispatcher`, generalised from
//! "fan out to all channels for a rule" to "deliver one notification
//! to one channel with retry, breaker, and dead-lettering".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use uuid::Uuid;

use broker_core::error::ErrorCategory;
use broker_core::{BrokerError, ExecutionRecord, ExecutionStatus};
use broker_notify::{Notification, Transport};

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::dead_letter::DeadLetterQueue;
use crate::recovery::{RecoveryOutcome, RecoveryRegistry, RecoveryStep};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
    pub dead_letter_retention: chrono::Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            dead_letter_retention: chrono::Duration::days(7),
        }
    }
}

pub struct DispatchRequest {
    pub event_id: String,
    pub hook_id: String,
    pub team_id: String,
    pub notification: Notification,
    /// Whether the downstream side tolerates redelivery. A request
    /// timeout is only retried when this is set; otherwise it is
    /// reported as `ExecutionStatus::Timeout` on the first elapsed
    /// attempt, per §4.6.
    pub idempotent: bool,
}

pub struct Dispatcher {
    transports: HashMap<String, Arc<dyn Transport>>,
    config: DispatchConfig,
    concurrency: Arc<Semaphore>,
    breakers: std::sync::Mutex<HashMap<String, CircuitBreaker>>,
    sequencers: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    recovery: RecoveryRegistry,
    dead_letters: std::sync::Mutex<DeadLetterQueue>,
}

impl Dispatcher {
    pub fn new(transports: Vec<Arc<dyn Transport>>, config: DispatchConfig, max_concurrency: usize) -> Self {
        let transports = transports
            .into_iter()
            .map(|t| (t.channel_name().to_string(), t))
            .collect();
        let dead_letters = DeadLetterQueue::new(config.dead_letter_retention);
        Self {
            transports,
            config,
            concurrency: Arc::new(Semaphore::new(max_concurrency.max(1))),
            breakers: std::sync::Mutex::new(HashMap::new()),
            sequencers: std::sync::Mutex::new(HashMap::new()),
            recovery: RecoveryRegistry::new(),
            dead_letters: std::sync::Mutex::new(dead_letters),
        }
    }

    fn sequencer_for(&self, channel: &str) -> Arc<AsyncMutex<()>> {
        let mut sequencers = self.sequencers.lock().expect("sequencers lock poisoned");
        sequencers
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn dead_letter_len(&self) -> usize {
        self.dead_letters.lock().expect("dead letter lock poisoned").len()
    }

    pub fn sweep_dead_letters(&self) {
        self.dead_letters
            .lock()
            .expect("dead letter lock poisoned")
            .sweep(Utc::now());
    }

    /// Delivers one notification to one channel, respecting the
    /// channel's circuit breaker and retrying transient failures with
    /// jittered backoff. Always returns an `ExecutionRecord`; never
    /// propagates the underlying transport error.
    pub async fn dispatch(&self, channel: &str, request: DispatchRequest) -> ExecutionRecord {
        let execution_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let _permit = self.concurrency.acquire().await.expect("semaphore closed");
        let sequencer = self.sequencer_for(channel);
        let _order = sequencer.lock().await;

        let Some(transport) = self.transports.get(channel) else {
            return self.failure_record(
                &execution_id,
                &request,
                started_at,
                vec![format!("no transport configured for channel '{channel}'")],
            );
        };

        if !self.allow_request(channel) {
            let record = self.failure_record(
                &execution_id,
                &request,
                started_at,
                vec![format!("circuit open for channel '{channel}'")],
            );
            self.dead_letter(record.clone(), "circuit open".to_string());
            return record;
        }

        let mut last_error: Option<BrokerError> = None;
        let mut timed_out = false;
        for attempt in 1..=self.config.max_attempts {
            let outcome = tokio::time::timeout(
                self.config.request_timeout,
                transport.send(&request.notification),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    self.on_success(channel);
                    return ExecutionRecord {
                        execution_id,
                        hook_id: request.hook_id,
                        event_id: request.event_id,
                        team_id: request.team_id,
                        status: ExecutionStatus::Success,
                        started_at,
                        ended_at: Utc::now(),
                        duration_ms: (Utc::now() - started_at).num_milliseconds().max(0) as u64,
                        delivered: true,
                        errors: Vec::new(),
                        notes: (attempt > 1).then(|| format!("succeeded on attempt {attempt}")),
                    };
                }
                Ok(Err(transport_err)) => {
                    timed_out = false;
                    let err: BrokerError = transport_err.into();
                    let retriable = err.is_retriable();
                    last_error = Some(err);
                    if retriable && attempt < self.config.max_attempts {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                        continue;
                    }
                    break;
                }
                Err(_elapsed) => {
                    timed_out = true;
                    last_error = Some(BrokerError::TransientDownstream(format!(
                        "channel '{channel}' timed out after {:?}",
                        self.config.request_timeout
                    )));
                    if request.idempotent && attempt < self.config.max_attempts {
                        tokio::time::sleep(self.backoff_for(attempt)).await;
                        continue;
                    }
                    break;
                }
            }
        }

        self.on_failure(channel);
        let error = last_error.unwrap_or(BrokerError::Internal("dispatch loop exited without error".to_string()));
        let outcome = self.run_recovery(channel, error.category());
        let status = if timed_out { ExecutionStatus::Timeout } else { ExecutionStatus::Failure };
        let mut record = self.final_record(&execution_id, &request, started_at, status, vec![error.to_string()]);

        match outcome {
            RecoveryOutcome::Recovered(RecoveryStep::QueueForLater) | RecoveryOutcome::Escalated => {
                self.dead_letter(record.clone(), error.to_string());
            }
            RecoveryOutcome::Recovered(step) => {
                record.notes = Some(format!("recovery step applied: {step:?}"));
            }
        }

        record
    }

    fn allow_request(&self, channel: &str) -> bool {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        breakers
            .entry(channel.to_string())
            .or_insert_with(|| CircuitBreaker::new(BreakerConfig::default()))
            .allow_request(Utc::now())
    }

    fn on_success(&self, channel: &str) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        if let Some(breaker) = breakers.get_mut(channel) {
            breaker.on_success(Utc::now());
        }
    }

    fn on_failure(&self, channel: &str) {
        let mut breakers = self.breakers.lock().expect("breaker lock poisoned");
        breakers
            .entry(channel.to_string())
            .or_insert_with(|| CircuitBreaker::new(BreakerConfig::default()))
            .on_failure(Utc::now());
    }

    /// The last resort when retries are exhausted: consult the
    /// per-category recovery workflow and take its first applicable
    /// step. Steps that require external wiring (cached data, partial
    /// collect, alternative channel, degraded content) are reported
    /// back as notes for the engine to act on; this crate only knows
    /// how to retry, queue, and escalate.
    fn run_recovery(&self, channel: &str, category: ErrorCategory) -> RecoveryOutcome {
        let Some(workflow) = self.recovery.workflow_for(category, channel) else {
            return RecoveryOutcome::Escalated;
        };
        match workflow
            .steps
            .iter()
            .find(|s| matches!(s, RecoveryStep::QueueForLater | RecoveryStep::Escalate))
        {
            Some(RecoveryStep::QueueForLater) => RecoveryOutcome::Recovered(RecoveryStep::QueueForLater),
            Some(RecoveryStep::Escalate) | None => RecoveryOutcome::Escalated,
            Some(other) => RecoveryOutcome::Recovered(*other),
        }
    }

    fn dead_letter(&self, record: ExecutionRecord, last_error: String) {
        self.dead_letters
            .lock()
            .expect("dead letter lock poisoned")
            .push(record, last_error, Utc::now());
    }

    fn failure_record(
        &self,
        execution_id: &str,
        request: &DispatchRequest,
        started_at: chrono::DateTime<Utc>,
        errors: Vec<String>,
    ) -> ExecutionRecord {
        self.final_record(execution_id, request, started_at, ExecutionStatus::Failure, errors)
    }

    fn final_record(
        &self,
        execution_id: &str,
        request: &DispatchRequest,
        started_at: chrono::DateTime<Utc>,
        status: ExecutionStatus,
        errors: Vec<String>,
    ) -> ExecutionRecord {
        let ended_at = Utc::now();
        ExecutionRecord {
            execution_id: execution_id.to_string(),
            hook_id: request.hook_id.clone(),
            event_id: request.event_id.clone(),
            team_id: request.team_id.clone(),
            status,
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).num_milliseconds().max(0) as u64,
            delivered: false,
            errors,
            notes: None,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.config.base_backoff.saturating_mul(1 << attempt.min(10));
        let capped = exp.min(self.config.max_backoff);
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 2 + 1);
        Duration::from_millis(capped.as_millis() as u64 / 2 + jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use broker_notify::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyTransport {
        name: String,
        fail_times: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, _notification: &Notification) -> Result<(), TransportError> {
            if self.fail_times.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(TransportError::Rejected {
                    status: 503,
                    body: "try again".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    struct AlwaysRejects {
        name: String,
    }

    #[async_trait]
    impl Transport for AlwaysRejects {
        async fn send(&self, _notification: &Notification) -> Result<(), TransportError> {
            Err(TransportError::Rejected {
                status: 400,
                body: "bad request".to_string(),
            })
        }

        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn notification() -> Notification {
        Notification {
            subject: "subj".to_string(),
            body: "body".to_string(),
            metadata: HashMap::new(),
        }
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            event_id: "event-1".to_string(),
            hook_id: "hook-1".to_string(),
            team_id: "team-1".to_string(),
            notification: notification(),
            idempotent: false,
        }
    }

    struct NeverReplies {
        name: String,
    }

    #[async_trait]
    impl Transport for NeverReplies {
        async fn send(&self, _notification: &Notification) -> Result<(), TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    #[tokio::test]
    async fn retries_transient_failure_then_succeeds() {
        let transport = Arc::new(FlakyTransport {
            name: "slack".to_string(),
            fail_times: AtomicUsize::new(2),
        });
        let dispatcher = Dispatcher::new(vec![transport], DispatchConfig::default(), 4);
        let record = dispatcher.dispatch("slack", request()).await;
        assert_eq!(record.status, ExecutionStatus::Success);
        assert!(record.delivered);
    }

    #[tokio::test]
    async fn permanent_failure_does_not_retry_and_dead_letters() {
        let transport = Arc::new(AlwaysRejects {
            name: "slack".to_string(),
        });
        let dispatcher = Dispatcher::new(vec![transport], DispatchConfig::default(), 4);
        let record = dispatcher.dispatch("slack", request()).await;
        assert_eq!(record.status, ExecutionStatus::Failure);
        assert_eq!(dispatcher.dead_letter_len(), 1);
    }

    #[tokio::test]
    async fn unknown_channel_fails_without_panicking() {
        let dispatcher = Dispatcher::new(vec![], DispatchConfig::default(), 4);
        let record = dispatcher.dispatch("nowhere", request()).await;
        assert_eq!(record.status, ExecutionStatus::Failure);
        assert!(!record.errors.is_empty());
    }

    fn short_timeout_config() -> DispatchConfig {
        DispatchConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            request_timeout: Duration::from_millis(10),
            dead_letter_retention: chrono::Duration::days(7),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_idempotent_timeout_is_reported_once_with_timeout_status() {
        let transport = Arc::new(NeverReplies {
            name: "slack".to_string(),
        });
        let dispatcher = Dispatcher::new(vec![transport], short_timeout_config(), 4);
        let record = dispatcher.dispatch("slack", request()).await;
        assert_eq!(record.status, ExecutionStatus::Timeout);
        assert!(!record.delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn idempotent_timeout_retries_up_to_max_attempts() {
        let transport = Arc::new(NeverReplies {
            name: "slack".to_string(),
        });
        let dispatcher = Dispatcher::new(vec![transport], short_timeout_config(), 4);
        let mut req = request();
        req.idempotent = true;
        let record = dispatcher.dispatch("slack", req).await;
        assert_eq!(record.status, ExecutionStatus::Timeout);
    }
}
