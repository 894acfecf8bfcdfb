//! The L4 smart batcher: similarity-grouped, size/time/burst/quiet-
//! hours aware accumulation of decisions into outgoing batches (§4.4).

pub mod batch;
pub mod batcher;
pub mod config;
pub mod quiet;

pub use batch::{Batch, FlushTrigger};
pub use batcher::{AddEffects, SmartBatcher};
pub use config::BatcherConfig;
pub use quiet::{NeverQuiet, QuietHoursGate};
