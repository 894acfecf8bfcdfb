//! Environment-driven configuration for broker deployables.
//!
//! Every field has a default; nothing panics on a missing environment
//! variable. `BrokerConfig::from_env` is the single entry point used by
//! `broker-cli`'s `serve` subcommand and by integration tests.

use std::collections::HashMap;

use serde::Serialize;

/// Resolved, typed configuration for one broker process.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerConfig {
    pub bind_host: String,
    pub bind_port: u16,

    /// Default dedup TTL, seconds. Overridable per event kind at the
    /// team-config layer (§4.2).
    pub dedup_ttl_secs: u64,
    /// Bound on the number of entries held in the dedup LRU.
    pub dedup_capacity: usize,

    pub batch_max_size: usize,
    pub batch_max_wait_secs: u64,
    pub batch_hard_ceiling_secs: u64,
    pub batch_burst_threshold: u32,
    pub batch_burst_backoff_factor: f64,

    pub circuit_consecutive_failure_threshold: u32,
    pub circuit_rate_failure_threshold: f64,
    pub circuit_cooldown_secs: u64,
    pub circuit_half_open_probes: u32,
    pub circuit_half_open_success_threshold: u32,

    pub hook_timeout_secs: u64,
    pub recovery_deadline_secs: u64,

    pub retention_raw_days: u32,
    pub retention_aggregate_days: u32,

    pub thread_idle_expiry_secs: u64,

    /// Per-source HMAC shared secret, keyed by source name
    /// (`"source-control"`, `"issue-tracker"`).
    #[serde(skip_serializing)]
    pub webhook_secrets: HashMap<String, String>,

    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8080,
            dedup_ttl_secs: 3600,
            dedup_capacity: 100_000,
            batch_max_size: 25,
            batch_max_wait_secs: 120,
            batch_hard_ceiling_secs: 900,
            batch_burst_threshold: 10,
            batch_burst_backoff_factor: 1.5,
            circuit_consecutive_failure_threshold: 10,
            circuit_rate_failure_threshold: 0.5,
            circuit_cooldown_secs: 300,
            circuit_half_open_probes: 3,
            circuit_half_open_success_threshold: 2,
            hook_timeout_secs: 30,
            recovery_deadline_secs: 300,
            retention_raw_days: 30,
            retention_aggregate_days: 180,
            thread_idle_expiry_secs: 86_400,
            webhook_secrets: HashMap::new(),
            log_level: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from the process environment, falling back
    /// to `.env` in the current directory if present, then to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut cfg = Self::default();
        cfg.bind_host = env_or("BROKER_BIND_HOST", &cfg.bind_host);
        cfg.bind_port = env_parsed_or("BROKER_BIND_PORT", cfg.bind_port);
        cfg.dedup_ttl_secs = env_parsed_or("BROKER_DEDUP_TTL_SECS", cfg.dedup_ttl_secs);
        cfg.dedup_capacity = env_parsed_or("BROKER_DEDUP_CAPACITY", cfg.dedup_capacity);
        cfg.batch_max_size = env_parsed_or("BROKER_BATCH_MAX_SIZE", cfg.batch_max_size);
        cfg.batch_max_wait_secs =
            env_parsed_or("BROKER_BATCH_MAX_WAIT_SECS", cfg.batch_max_wait_secs);
        cfg.batch_hard_ceiling_secs =
            env_parsed_or("BROKER_BATCH_HARD_CEILING_SECS", cfg.batch_hard_ceiling_secs);
        cfg.batch_burst_threshold =
            env_parsed_or("BROKER_BATCH_BURST_THRESHOLD", cfg.batch_burst_threshold);
        cfg.batch_burst_backoff_factor = env_parsed_or(
            "BROKER_BATCH_BURST_BACKOFF_FACTOR",
            cfg.batch_burst_backoff_factor,
        );
        cfg.circuit_consecutive_failure_threshold = env_parsed_or(
            "BROKER_CIRCUIT_CONSECUTIVE_FAILURE_THRESHOLD",
            cfg.circuit_consecutive_failure_threshold,
        );
        cfg.circuit_rate_failure_threshold = env_parsed_or(
            "BROKER_CIRCUIT_RATE_FAILURE_THRESHOLD",
            cfg.circuit_rate_failure_threshold,
        );
        cfg.circuit_cooldown_secs =
            env_parsed_or("BROKER_CIRCUIT_COOLDOWN_SECS", cfg.circuit_cooldown_secs);
        cfg.circuit_half_open_probes =
            env_parsed_or("BROKER_CIRCUIT_HALF_OPEN_PROBES", cfg.circuit_half_open_probes);
        cfg.circuit_half_open_success_threshold = env_parsed_or(
            "BROKER_CIRCUIT_HALF_OPEN_SUCCESS_THRESHOLD",
            cfg.circuit_half_open_success_threshold,
        );
        cfg.hook_timeout_secs = env_parsed_or("BROKER_HOOK_TIMEOUT_SECS", cfg.hook_timeout_secs);
        cfg.recovery_deadline_secs =
            env_parsed_or("BROKER_RECOVERY_DEADLINE_SECS", cfg.recovery_deadline_secs);
        cfg.retention_raw_days = env_parsed_or("BROKER_RETENTION_RAW_DAYS", cfg.retention_raw_days);
        cfg.retention_aggregate_days = env_parsed_or(
            "BROKER_RETENTION_AGGREGATE_DAYS",
            cfg.retention_aggregate_days,
        );
        cfg.thread_idle_expiry_secs =
            env_parsed_or("BROKER_THREAD_IDLE_EXPIRY_SECS", cfg.thread_idle_expiry_secs);
        cfg.log_level = env_or("BROKER_LOG_LEVEL", &cfg.log_level);

        if let Ok(v) = std::env::var("BROKER_WEBHOOK_SECRET_SOURCE_CONTROL") {
            cfg.webhook_secrets.insert("source-control".to_string(), v);
        }
        if let Ok(v) = std::env::var("BROKER_WEBHOOK_SECRET_ISSUE_TRACKER") {
            cfg.webhook_secrets.insert("issue-tracker".to_string(), v);
        }

        cfg
    }

    /// A copy of this config safe to log or expose over an API: secret
    /// fields are dropped rather than masked, since `webhook_secrets`
    /// is already `#[serde(skip_serializing)]`.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = BrokerConfig::default();
        assert_eq!(cfg.bind_port, 8080);
        assert_eq!(cfg.retention_raw_days, 30);
        assert_eq!(cfg.retention_aggregate_days, 180);
    }

    #[test]
    fn redacted_summary_omits_secrets() {
        let mut cfg = BrokerConfig::default();
        cfg.webhook_secrets
            .insert("source-control".into(), "super-secret".into());
        let summary = cfg.redacted_summary();
        assert!(summary.get("webhook_secrets").is_none());
        assert!(!summary.to_string().contains("super-secret"));
    }

    #[test]
    fn env_parsed_or_falls_back_on_garbage() {
        std::env::set_var("BROKER_TEST_GARBAGE", "not-a-number");
        let v: u64 = env_parsed_or("BROKER_TEST_GARBAGE", 42);
        assert_eq!(v, 42);
        std::env::remove_var("BROKER_TEST_GARBAGE");
    }
}
