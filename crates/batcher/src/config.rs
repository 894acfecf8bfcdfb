//! Per-`(channel, kind-group)` batching parameters (§4.4, §3 TeamConfig
//! `BatchParams`).

use std::time::Duration;

use broker_core::Urgency;

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub max_batch_size: usize,
    pub max_wait: Duration,
    pub min_inter_arrival_grace: Duration,
    pub hard_ceiling: Duration,
    /// Events at or above this urgency always deliver immediately.
    pub immediate_threshold: Urgency,
    /// Hamming-distance threshold below which an event joins the open
    /// batch's centroid rather than starting a new batch.
    pub similarity_threshold: u32,
    /// Arrivals per rolling one-minute window above this trigger burst
    /// handling.
    pub burst_threshold: u32,
    /// Multiplicative factor applied to the deadline extension each
    /// time a burst window is observed, reset once arrivals drop below
    /// `burst_threshold`.
    pub burst_backoff_factor: f64,
    pub rate_limit_per_minute: u32,
    pub rate_limit_per_hour: u32,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_wait: Duration::from_secs(300),
            min_inter_arrival_grace: Duration::from_secs(30),
            hard_ceiling: Duration::from_secs(900),
            immediate_threshold: Urgency::Critical,
            similarity_threshold: 10,
            burst_threshold: 20,
            burst_backoff_factor: 1.5,
            rate_limit_per_minute: 30,
            rate_limit_per_hour: 200,
        }
    }
}
