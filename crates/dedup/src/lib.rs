//! The L2 dedup store: suppresses repeat deliveries of semantically
//! identical events and flags near-duplicates for the batcher and
//! threading layers (§4.2).

pub mod entry;
pub mod similarity;
pub mod store;

pub use entry::{DedupEntry, DedupKey};
pub use similarity::find_near_duplicates;
pub use store::{DedupStore, Observation};
