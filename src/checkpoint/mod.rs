//! Durable checkpoint persistence.
//!
//! The scheduler keeps its checkpoints in memory and writes every advance
//! through to a `CheckpointStore` so a restarted engine resumes each shard
//! after its last applied record.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::model::Checkpoint;

pub mod file;
pub mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

/// Result type for checkpoint store operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors from a checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Persistence of per-shard checkpoints, keyed by stream id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load all checkpoints of a stream as shard id -> sequence number.
    async fn load(&self, stream_id: &str) -> Result<HashMap<String, String>>;

    /// Record a checkpoint. May be buffered until `flush`.
    async fn save(&self, stream_id: &str, checkpoint: &Checkpoint) -> Result<()>;

    /// Persist any buffered checkpoints of a stream.
    async fn flush(&self, stream_id: &str) -> Result<()>;
}
