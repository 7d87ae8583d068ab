//! Construction of collaborator clients from configuration.
//!
//! The orchestrator asks a `Connectors` implementation for the source,
//! target, topic and checkpoint store of each stream. `DefaultConnectors`
//! builds the real clients; `MockConnectors` hands out in-memory mocks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
use crate::config::{CheckpointStoreType, Config, StreamDefinition};
use crate::push::PushTopic;
use crate::source::StreamSource;
use crate::target::{HttpTargetAdapter, TargetAdapter};

pub mod mock;

pub use mock::MockConnectors;

/// Failure to build a collaborator for a stream.
#[derive(Debug, thiserror::Error)]
#[error("Failed to connect {stream}: {reason}")]
pub struct ConnectorError {
    pub stream: String,
    pub reason: String,
}

impl ConnectorError {
    pub fn new(stream: &StreamDefinition, reason: impl std::fmt::Display) -> Self {
        Self {
            stream: stream.stream_id(),
            reason: reason.to_string(),
        }
    }
}

/// Factory of per-stream collaborators.
#[async_trait]
pub trait Connectors: Send + Sync {
    /// Change stream read by a pull stream.
    async fn stream_source(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn StreamSource>, ConnectorError>;

    /// Write API a pull stream applies changes to.
    async fn pull_target(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError>;

    /// Topic a push stream subscribes to.
    async fn push_topic(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn PushTopic>, ConnectorError>;

    /// Write API a push stream applies changes to.
    async fn push_target(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError>;

    /// Store shared by all pull streams.
    fn checkpoint_store(&self) -> Arc<dyn CheckpointStore>;
}

/// Connectors for the real services.
///
/// DynamoDB clients require the `dynamo` feature and Pub/Sub the `pubsub`
/// feature; without them, streams needing those clients fail to start.
pub struct DefaultConnectors {
    config: Config,
    checkpoint_store: Arc<dyn CheckpointStore>,
}

impl DefaultConnectors {
    pub async fn new(config: Config) -> Result<Self, crate::checkpoint::CheckpointError> {
        let checkpoint_store: Arc<dyn CheckpointStore> = match config.checkpoint.store_type {
            CheckpointStoreType::Memory => Arc::new(MemoryCheckpointStore::new()),
            CheckpointStoreType::File => Arc::new(
                FileCheckpointStore::new(
                    config.checkpoint.path.clone(),
                    config.checkpoint.flush_interval(),
                )
                .await?,
            ),
        };
        info!(store = ?config.checkpoint.store_type, "Checkpoint store ready");

        Ok(Self {
            config,
            checkpoint_store,
        })
    }
}

#[async_trait]
impl Connectors for DefaultConnectors {
    async fn stream_source(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn StreamSource>, ConnectorError> {
        #[cfg(feature = "dynamo")]
        {
            let stream_arn = stream
                .source_stream_id
                .clone()
                .ok_or_else(|| ConnectorError::new(stream, "no source_stream_id"))?;
            let source = crate::source::DynamoStreamSource::new(
                stream_arn,
                self.config.source.endpoint_url.as_deref(),
                self.config.source.region.as_deref(),
            )
            .await
            .map_err(|e| ConnectorError::new(stream, e))?;
            Ok(Arc::new(source))
        }
        #[cfg(not(feature = "dynamo"))]
        {
            Err(ConnectorError::new(
                stream,
                "DynamoDB Streams support requires the `dynamo` feature",
            ))
        }
    }

    async fn pull_target(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError> {
        let adapter = HttpTargetAdapter::new(self.config.target.http_config())
            .map_err(|e| ConnectorError::new(stream, e))?;
        Ok(Arc::new(adapter))
    }

    async fn push_topic(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn PushTopic>, ConnectorError> {
        #[cfg(feature = "pubsub")]
        {
            let project = stream
                .push_topic
                .as_ref()
                .map(|t| t.project.clone())
                .ok_or_else(|| ConnectorError::new(stream, "no push_topic"))?;
            let topic = crate::push::PubSubTopic::new(project)
                .await
                .map_err(|e| ConnectorError::new(stream, e))?;
            Ok(Arc::new(topic))
        }
        #[cfg(not(feature = "pubsub"))]
        {
            Err(ConnectorError::new(
                stream,
                "Pub/Sub support requires the `pubsub` feature",
            ))
        }
    }

    async fn push_target(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError> {
        #[cfg(feature = "dynamo")]
        {
            let adapter = crate::target::DynamoTargetAdapter::new(
                self.config.source.endpoint_url.as_deref(),
                self.config.source.region.as_deref(),
            )
            .await
            .map_err(|e| ConnectorError::new(stream, e))?;
            Ok(Arc::new(adapter))
        }
        #[cfg(not(feature = "dynamo"))]
        {
            Err(ConnectorError::new(
                stream,
                "DynamoDB support requires the `dynamo` feature",
            ))
        }
    }

    fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        self.checkpoint_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pull_stream() -> StreamDefinition {
        serde_yaml::from_str("direction: pull\ntable_name: users\nsource_stream_id: arn\n")
            .unwrap()
    }

    #[tokio::test]
    async fn test_file_checkpoint_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.checkpoint.store_type = CheckpointStoreType::File;
        config.checkpoint.path = dir.path().join("checkpoints");

        let connectors = DefaultConnectors::new(config).await.unwrap();
        let store = connectors.checkpoint_store();

        store
            .save("pull-users", &crate::model::Checkpoint::new("a", "1"))
            .await
            .unwrap();
        store.flush("pull-users").await.unwrap();
        assert!(dir
            .path()
            .join("checkpoints")
            .join("checkpoint-pull-users.json")
            .exists());
    }

    #[tokio::test]
    async fn test_pull_target_is_http_adapter() {
        let connectors = DefaultConnectors::new(Config::default()).await.unwrap();
        assert!(connectors.pull_target(&pull_stream()).await.is_ok());
    }

    #[cfg(not(feature = "dynamo"))]
    #[tokio::test]
    async fn test_stream_source_requires_feature() {
        let connectors = DefaultConnectors::new(Config::default()).await.unwrap();
        let err = connectors.stream_source(&pull_stream()).await.err().unwrap();
        assert_eq!(err.stream, "pull-users");
    }
}
