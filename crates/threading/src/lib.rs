//! Conversation threading (§4.8): binds related outbound notifications
//! into one thread key, preferring an entity-based match, then
//! content-similarity within a time window, then temporal proximity.

pub mod manager;
pub mod types;

pub use manager::{ThreadManager, ThreadingConfig};
pub use types::{ThreadInputs, ThreadState};
