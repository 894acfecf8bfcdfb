//! Implements `broker-server`'s `AdminOps` boundary over `Pipeline`,
//! the same same-crate-trait/engine-supplied-impl split `ingestor.rs`
//! uses for `EventIngestor`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use broker_core::ExecutionRecord;
use broker_server::AdminOps;

use crate::pipeline::Pipeline;

#[async_trait]
impl AdminOps for Pipeline {
    async fn drain(&self) -> usize {
        Pipeline::drain(self).await
    }

    async fn replay(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<ExecutionRecord> {
        Pipeline::replay(self, from, to).await
    }

    fn purge_dedup(&self, kind: &str) -> usize {
        Pipeline::purge_dedup(self, kind)
    }
}
