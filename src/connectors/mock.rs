//! Mock connectors for testing.
//!
//! Sources are looked up by `source_stream_id` and topics by subscription id;
//! all pull streams share one target adapter and all push streams another.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{ConnectorError, Connectors};
use crate::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use crate::config::StreamDefinition;
use crate::push::{MockPushTopic, PushTopic};
use crate::source::{MockStreamSource, StreamSource};
use crate::target::{MockTargetAdapter, TargetAdapter};

#[derive(Default)]
pub struct MockConnectors {
    sources: HashMap<String, Arc<MockStreamSource>>,
    topics: HashMap<String, Arc<MockPushTopic>>,
    pull_target: Arc<MockTargetAdapter>,
    push_target: Arc<MockTargetAdapter>,
    checkpoint_store: Arc<MemoryCheckpointStore>,
}

impl MockConnectors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, stream_id: &str, source: Arc<MockStreamSource>) -> Self {
        self.sources.insert(stream_id.to_string(), source);
        self
    }

    pub fn with_topic(mut self, subscription_id: &str, topic: Arc<MockPushTopic>) -> Self {
        self.topics.insert(subscription_id.to_string(), topic);
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<MemoryCheckpointStore>) -> Self {
        self.checkpoint_store = store;
        self
    }

    pub fn pull_adapter(&self) -> Arc<MockTargetAdapter> {
        self.pull_target.clone()
    }

    pub fn push_adapter(&self) -> Arc<MockTargetAdapter> {
        self.push_target.clone()
    }
}

#[async_trait]
impl Connectors for MockConnectors {
    async fn stream_source(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn StreamSource>, ConnectorError> {
        let source_id = stream.source_stream_id.as_deref().unwrap_or_default();
        self.sources
            .get(source_id)
            .map(|s| s.clone() as Arc<dyn StreamSource>)
            .ok_or_else(|| ConnectorError::new(stream, format!("no mock source {}", source_id)))
    }

    async fn pull_target(
        &self,
        _stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError> {
        Ok(self.pull_target.clone())
    }

    async fn push_topic(
        &self,
        stream: &StreamDefinition,
    ) -> Result<Arc<dyn PushTopic>, ConnectorError> {
        let subscription_id = stream
            .push_topic
            .as_ref()
            .map(|t| t.subscription_id.as_str())
            .unwrap_or_default();
        self.topics
            .get(subscription_id)
            .map(|t| t.clone() as Arc<dyn PushTopic>)
            .ok_or_else(|| {
                ConnectorError::new(stream, format!("no mock topic {}", subscription_id))
            })
    }

    async fn push_target(
        &self,
        _stream: &StreamDefinition,
    ) -> Result<Arc<dyn TargetAdapter>, ConnectorError> {
        Ok(self.push_target.clone())
    }

    fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        self.checkpoint_store.clone()
    }
}
