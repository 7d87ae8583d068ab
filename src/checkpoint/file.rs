//! File-backed checkpoint store.
//!
//! One JSON file per stream (`checkpoint-<stream>.json`) under a base
//! directory. Saves are batched in memory and written when the flush interval
//! has elapsed, or on an explicit `flush`. Writes go through a temp file and
//! a rename so a crash never leaves a torn file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CheckpointStore, Result};
use crate::model::Checkpoint;

/// Default interval between batched writes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// On-disk layout of one stream's checkpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointFile {
    /// Sequence number per shard id.
    positions: HashMap<String, String>,
    #[serde(default)]
    version: u32,
}

struct StreamEntry {
    data: CheckpointFile,
    dirty: bool,
    last_flush: Instant,
}

impl StreamEntry {
    fn new(data: CheckpointFile) -> Self {
        Self {
            data,
            dirty: false,
            last_flush: Instant::now(),
        }
    }
}

/// Checkpoint store writing JSON files.
pub struct FileCheckpointStore {
    base_path: PathBuf,
    flush_interval: Duration,
    streams: Mutex<HashMap<String, StreamEntry>>,
}

impl FileCheckpointStore {
    /// Create a store under `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>, flush_interval: Duration) -> Result<Self> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path).await?;

        info!(path = %base_path.display(), "Using file checkpoint store");

        Ok(Self {
            base_path,
            flush_interval,
            streams: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the checkpoint file of a stream.
    pub fn file_path(&self, stream_id: &str) -> PathBuf {
        self.base_path
            .join(format!("checkpoint-{}.json", file_stem(stream_id)))
    }

    async fn read_file(path: &Path) -> Result<CheckpointFile> {
        if !tokio::fs::try_exists(path).await? {
            debug!(path = %path.display(), "Checkpoint file not found, starting fresh");
            return Ok(CheckpointFile::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write_file(path: &Path, data: &CheckpointFile) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &json).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!(
            path = %path.display(),
            positions = data.positions.len(),
            "Flushed checkpoint"
        );
        Ok(())
    }

    async fn flush_entry(&self, stream_id: &str, entry: &mut StreamEntry) -> Result<()> {
        if !entry.dirty {
            return Ok(());
        }
        Self::write_file(&self.file_path(stream_id), &entry.data).await?;
        entry.dirty = false;
        entry.last_flush = Instant::now();
        Ok(())
    }
}

/// Replace characters that are not safe in a file name (ARNs carry `:` and `/`).
fn file_stem(stream_id: &str) -> String {
    stream_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, stream_id: &str) -> Result<HashMap<String, String>> {
        let path = self.file_path(stream_id);
        let data = Self::read_file(&path).await?;

        info!(
            path = %path.display(),
            positions = data.positions.len(),
            "Loaded checkpoints"
        );

        let positions = data.positions.clone();
        self.streams
            .lock()
            .await
            .insert(stream_id.to_string(), StreamEntry::new(data));
        Ok(positions)
    }

    async fn save(&self, stream_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        let mut streams = self.streams.lock().await;
        let entry = match streams.entry(stream_id.to_string()) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                let data = Self::read_file(&self.file_path(stream_id)).await?;
                e.insert(StreamEntry::new(data))
            }
        };

        entry.data.positions.insert(
            checkpoint.shard_id.clone(),
            checkpoint.sequence_number.clone(),
        );
        entry.dirty = true;

        if entry.last_flush.elapsed() >= self.flush_interval {
            self.flush_entry(stream_id, entry).await?;
        }
        Ok(())
    }

    async fn flush(&self, stream_id: &str) -> Result<()> {
        let mut streams = self.streams.lock().await;
        match streams.get_mut(stream_id) {
            Some(entry) => self.flush_entry(stream_id, entry).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointError;

    #[test]
    fn test_file_stem_sanitizes_arn() {
        assert_eq!(
            file_stem("arn:aws:dynamodb:us-east-1:1:table/users/stream/2024"),
            "arn_aws_dynamodb_us-east-1_1_table_users_stream_2024"
        );
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path(), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.load("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_flushes_when_interval_elapsed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path(), Duration::ZERO)
            .await
            .unwrap();

        store
            .save("users", &Checkpoint::new("shard-a", "100"))
            .await
            .unwrap();

        assert!(store.file_path("users").exists());

        let reopened = FileCheckpointStore::new(dir.path(), Duration::ZERO)
            .await
            .unwrap();
        let loaded = reopened.load("users").await.unwrap();
        assert_eq!(loaded.get("shard-a").map(String::as_str), Some("100"));
    }

    #[tokio::test]
    async fn test_save_is_batched_until_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path(), Duration::from_secs(3600))
            .await
            .unwrap();

        store
            .save("users", &Checkpoint::new("shard-a", "100"))
            .await
            .unwrap();
        assert!(!store.file_path("users").exists());

        store.flush("users").await.unwrap();
        assert!(store.file_path("users").exists());
        assert!(!store.file_path("users").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path(), Duration::ZERO)
            .await
            .unwrap();
        tokio::fs::write(store.file_path("users"), "not json")
            .await
            .unwrap();

        let err = store.load("users").await.unwrap_err();
        assert!(matches!(err, CheckpointError::Format(_)));
    }
}
