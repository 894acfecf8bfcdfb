//! Abstract storage traits (§4.5 Durability, §4.7 write path) plus an
//! in-memory reference implementation.

pub mod error;
pub mod kv;
pub mod memory;
pub mod tabular;

pub use error::StorageError;
pub use kv::{KvStore, TxOp};
pub use memory::{InMemoryKvStore, InMemoryTabularStore};
pub use tabular::{RowKey, TabularStore};
