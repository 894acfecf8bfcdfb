//! Outbound dispatch (§4.6): circuit breakers per service, bounded
//! worker-pool concurrency with per-channel ordering, retry with
//! jittered backoff for transient failures, recovery workflows for
//! everything else, and a dead-letter queue for what's left over.

pub mod breaker;
pub mod dead_letter;
pub mod dispatcher;
pub mod recovery;

pub use breaker::{BreakerConfig, BreakerPhase, CircuitBreaker};
pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use dispatcher::{DispatchConfig, DispatchRequest, Dispatcher};
pub use recovery::{RecoveryOutcome, RecoveryRegistry, RecoveryStep, RecoveryWorkflow};
