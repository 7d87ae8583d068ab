//! Engine, checkpoint, target and source sections.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::replication::ReplicationSettings;
use crate::target::HttpTargetConfig;

/// Pull-engine timing and policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Consecutive empty pages before a shard yields its turn.
    pub empty_read_threshold: u32,
    /// Delay before the first topology refresh.
    pub refresh_initial_delay_ms: u64,
    /// Interval between topology refreshes.
    pub refresh_interval_ms: u64,
    /// Pause before a quiet shard yields.
    pub yield_delay_ms: u64,
    /// Pause when no shard is in process.
    pub idle_delay_ms: u64,
    /// Promote shards whose parent is no longer in the stream topology.
    pub adopt_orphaned_shards: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            empty_read_threshold: 5,
            refresh_initial_delay_ms: 1000,
            refresh_interval_ms: 10_000,
            yield_delay_ms: 5000,
            idle_delay_ms: 1000,
            adopt_orphaned_shards: false,
        }
    }
}

impl EngineConfig {
    pub fn replication_settings(&self) -> ReplicationSettings {
        ReplicationSettings {
            empty_read_threshold: self.empty_read_threshold,
            refresh_initial_delay: Duration::from_millis(self.refresh_initial_delay_ms),
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            yield_delay: Duration::from_millis(self.yield_delay_ms),
            idle_delay: Duration::from_millis(self.idle_delay_ms),
            adopt_orphaned_shards: self.adopt_orphaned_shards,
        }
    }
}

/// Checkpoint store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStoreType {
    /// Checkpoints are lost on restart.
    #[default]
    Memory,
    /// JSON files under `path`.
    File,
}

/// Checkpoint persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    #[serde(rename = "type")]
    pub store_type: CheckpointStoreType,
    /// Directory of checkpoint files.
    pub path: PathBuf,
    pub flush_interval_ms: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            store_type: CheckpointStoreType::Memory,
            path: PathBuf::from("./data/checkpoints"),
            flush_interval_ms: 5000,
        }
    }
}

impl CheckpointConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Write API of the pull-direction target.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// DynamoDB-compatible HTTP endpoint.
    pub endpoint: String,
    pub max_retries: usize,
    pub timeout_ms: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9050/v1".to_string(),
            max_retries: 3,
            timeout_ms: 10_000,
        }
    }
}

impl TargetConfig {
    pub fn http_config(&self) -> HttpTargetConfig {
        HttpTargetConfig {
            endpoint: self.endpoint.clone(),
            max_retries: self.max_retries,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// AWS client settings shared by the stream source and the DynamoDB writer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint override (e.g. DynamoDB Local).
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
}
