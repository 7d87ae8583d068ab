//! In-memory checkpoint store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CheckpointError, CheckpointStore, Result};
use crate::model::Checkpoint;

/// Checkpoint store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    streams: RwLock<HashMap<String, HashMap<String, String>>>,
    fail_on_save: RwLock<bool>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    /// Seed a checkpoint directly.
    pub async fn insert(&self, stream_id: &str, checkpoint: Checkpoint) {
        self.streams
            .write()
            .await
            .entry(stream_id.to_string())
            .or_default()
            .insert(checkpoint.shard_id, checkpoint.sequence_number);
    }

    pub async fn get(&self, stream_id: &str, shard_id: &str) -> Option<String> {
        self.streams
            .read()
            .await
            .get(stream_id)
            .and_then(|shards| shards.get(shard_id).cloned())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, stream_id: &str) -> Result<HashMap<String, String>> {
        Ok(self
            .streams
            .read()
            .await
            .get(stream_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, stream_id: &str, checkpoint: &Checkpoint) -> Result<()> {
        if *self.fail_on_save.read().await {
            return Err(CheckpointError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "Mock save failure",
            )));
        }
        self.insert(stream_id, checkpoint.clone()).await;
        Ok(())
    }

    async fn flush(&self, _stream_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_load_per_stream() {
        let store = MemoryCheckpointStore::new();
        store
            .save("orders", &Checkpoint::new("shard-a", "100"))
            .await
            .unwrap();
        store
            .save("orders", &Checkpoint::new("shard-a", "200"))
            .await
            .unwrap();

        let loaded = store.load("orders").await.unwrap();
        assert_eq!(loaded.get("shard-a").map(String::as_str), Some("200"));
        assert!(store.load("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_on_save() {
        let store = MemoryCheckpointStore::new();
        store.set_fail_on_save(true).await;

        let result = store.save("orders", &Checkpoint::new("shard-a", "1")).await;
        assert!(matches!(result, Err(CheckpointError::Io(_))));
        assert!(store.get("orders", "shard-a").await.is_none());
    }
}
