//! Source change-stream client.
//!
//! The engine consumes the source through three paging calls modelled on
//! DynamoDB Streams: topology description, iterator acquisition and record
//! fetches.
//!
//! Implementations:
//! - `DynamoStreamSource`: DynamoDB Streams (feature `dynamo`)
//! - `MockStreamSource`: In-memory scripted stream for testing

use async_trait::async_trait;

use crate::model::{Shard, StreamRecord};

#[cfg(feature = "dynamo")]
pub mod dynamo;
pub mod mock;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoStreamSource;
pub use mock::{MockShard, MockStreamSource};

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors returned by a source stream client.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Shard iterator expired or unknown: {0}")]
    ExpiredIterator(String),
}

/// Where a shard iterator starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    /// Oldest record still retained in the shard.
    TrimHorizon,
    /// Immediately after the given sequence number.
    AfterSequenceNumber(String),
}

/// One page of the stream topology.
#[derive(Debug, Clone, Default)]
pub struct TopologyPage {
    pub shards: Vec<Shard>,
    /// Cursor for the next page; `None` on the last page.
    pub last_evaluated_shard_id: Option<String>,
}

/// One page of records read through an iterator.
#[derive(Debug, Clone, Default)]
pub struct RecordsPage {
    pub records: Vec<StreamRecord>,
    /// Iterator for the next page; `None` once the shard is sealed and drained.
    pub next_iterator: Option<String>,
}

/// Client of a pull-based, shard-partitioned change stream.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Describe one page of shards, starting after `exclusive_start_shard_id`.
    async fn describe_topology(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<TopologyPage>;

    /// Obtain an iterator token for a shard.
    async fn get_iterator(&self, shard_id: &str, position: IteratorPosition) -> Result<String>;

    /// Read a page of records through an iterator token.
    async fn get_records(&self, iterator: &str) -> Result<RecordsPage>;
}
