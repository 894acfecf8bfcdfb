//! Periodic tick tasks (§4.4 deadline sweep, §4.5 digest flush, §4.6
//! dead-letter retention, §4.7 execution-log retention), grounded on
//! the `server::rule_runner::run_rule_loop` shape: one
//! `tokio::spawn`'d loop per concern, a fixed tick interval, errors
//! logged through `tracing` without ever halting the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::pipeline::Pipeline;

const BATCH_TICK_INTERVAL_SECS: u64 = 15;
const DIGEST_TICK_INTERVAL_SECS: u64 = 300;
const DEAD_LETTER_SWEEP_INTERVAL_SECS: u64 = 3600;
const EXECLOG_RETENTION_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Spawns every background task this engine runs, returning their
/// join handles so `broker-cli serve` can await them on shutdown.
pub fn spawn_all(pipeline: Arc<Pipeline>) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(run_batch_tick(pipeline.clone())),
        tokio::spawn(run_digest_tick(pipeline.clone())),
        tokio::spawn(run_dead_letter_sweep(pipeline.clone())),
        tokio::spawn(run_execlog_retention_sweep(pipeline)),
    ]
}

async fn run_batch_tick(pipeline: Arc<Pipeline>) {
    let mut interval = tokio::time::interval(Duration::from_secs(BATCH_TICK_INTERVAL_SECS));
    loop {
        interval.tick().await;
        pipeline.tick_batches(Utc::now()).await;
    }
}

async fn run_digest_tick(pipeline: Arc<Pipeline>) {
    let mut interval = tokio::time::interval(Duration::from_secs(DIGEST_TICK_INTERVAL_SECS));
    loop {
        interval.tick().await;
        pipeline.flush_due_digests(Utc::now()).await;
    }
}

async fn run_dead_letter_sweep(pipeline: Arc<Pipeline>) {
    let mut interval = tokio::time::interval(Duration::from_secs(DEAD_LETTER_SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        pipeline.sweep_dead_letters();
    }
}

async fn run_execlog_retention_sweep(pipeline: Arc<Pipeline>) {
    let mut interval = tokio::time::interval(Duration::from_secs(EXECLOG_RETENTION_SWEEP_INTERVAL_SECS));
    loop {
        interval.tick().await;
        pipeline.sweep_execution_log(Utc::now()).await;
    }
}
