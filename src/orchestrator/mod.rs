//! Stream orchestration.
//!
//! Turns the configured stream definitions into running pipelines, one tokio
//! task per enabled definition, each under a child of a root cancellation
//! token. A stream that fails stays stopped; the others keep running.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError, Direction, StreamDefinition};
use crate::connectors::{ConnectorError, Connectors};
use crate::dispatch::RecordDispatcher;
use crate::push::{PushConsumer, PushError};
use crate::replication::{PullReplicator, ReplicationError, ReplicationSettings};

/// Errors that end one stream.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error("Stream task failed: {0}")]
    Task(String),
}

/// A running stream.
pub struct StreamHandle {
    stream_id: String,
    direction: Direction,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), OrchestratorError>>,
}

impl StreamHandle {
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Request a cooperative stop of this stream only.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the stream to end.
    pub async fn join(self) -> Result<(), OrchestratorError> {
        self.task
            .await
            .map_err(|e| OrchestratorError::Task(e.to_string()))?
    }
}

/// Final state of one stream.
#[derive(Debug)]
pub struct StreamReport {
    pub stream_id: String,
    pub result: Result<(), OrchestratorError>,
}

/// Runs every enabled stream of a configuration.
pub struct Orchestrator {
    config: Config,
    connectors: Arc<dyn Connectors>,
}

impl Orchestrator {
    pub fn new(config: Config, connectors: Arc<dyn Connectors>) -> Self {
        Self { config, connectors }
    }

    /// Spawn one task per enabled definition under `cancel`.
    pub fn start(&self, cancel: &CancellationToken) -> Vec<StreamHandle> {
        let settings = self.config.engine.replication_settings();
        let mut handles = Vec::new();

        for definition in &self.config.streams {
            let stream_id = definition.stream_id();
            if !definition.enabled {
                info!(stream = %stream_id, "Stream disabled, skipping");
                continue;
            }

            let token = cancel.child_token();
            let task = tokio::spawn(run_stream(
                definition.clone(),
                self.connectors.clone(),
                settings.clone(),
                token.clone(),
            ));

            info!(stream = %stream_id, direction = %definition.direction, "Stream started");
            handles.push(StreamHandle {
                stream_id,
                direction: definition.direction,
                cancel: token,
                task,
            });
        }

        handles
    }

    /// Run all streams until `shutdown` resolves or every stream has ended.
    ///
    /// Cancellation is cooperative: calls already in flight complete before
    /// their stream observes it.
    pub async fn run<F>(&self, shutdown: F) -> Vec<StreamReport>
    where
        F: Future<Output = ()>,
    {
        let root = CancellationToken::new();
        let handles = self.start(&root);
        if handles.is_empty() {
            warn!("No enabled streams configured");
            return Vec::new();
        }

        let all_done = join_all(handles.into_iter().map(|handle| async move {
            let stream_id = handle.stream_id.clone();
            StreamReport {
                stream_id,
                result: handle.join().await,
            }
        }));
        tokio::pin!(all_done);

        let reports = tokio::select! {
            reports = &mut all_done => reports,
            _ = shutdown => {
                info!("Shutdown requested, stopping streams");
                root.cancel();
                all_done.await
            }
        };
        root.cancel();

        for report in &reports {
            match &report.result {
                Ok(()) => info!(stream = %report.stream_id, "Stream stopped"),
                Err(e) => error!(stream = %report.stream_id, error = %e, "Stream failed"),
            }
        }
        reports
    }
}

async fn run_stream(
    definition: StreamDefinition,
    connectors: Arc<dyn Connectors>,
    settings: ReplicationSettings,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    let stream_id = definition.stream_id();
    let result = run_definition(&definition, connectors, settings, cancel).await;
    if let Err(e) = &result {
        error!(stream = %stream_id, error = %e, "Stream ended with error");
    }
    result
}

async fn run_definition(
    definition: &StreamDefinition,
    connectors: Arc<dyn Connectors>,
    settings: ReplicationSettings,
    cancel: CancellationToken,
) -> Result<(), OrchestratorError> {
    definition.validate()?;
    let stream_id = definition.stream_id();

    match definition.direction {
        Direction::Pull => {
            let source = connectors.stream_source(definition).await?;
            let target = connectors.pull_target(definition).await?;
            let dispatcher = RecordDispatcher::new(&definition.table_name, target);

            let mut replicator = PullReplicator::new(stream_id, source, dispatcher, settings)
                .with_checkpoint_store(connectors.checkpoint_store());
            if let Some(checkpoint) = definition.checkpoint() {
                replicator = replicator.with_initial_checkpoint(checkpoint);
            }

            replicator.run(cancel).await?;
        }
        Direction::Push => {
            let topic = connectors.push_topic(definition).await?;
            let target = connectors.push_target(definition).await?;
            let dispatcher = RecordDispatcher::new(&definition.table_name, target);
            let subscription_id = definition
                .push_topic
                .as_ref()
                .map(|t| t.subscription_id.clone())
                .unwrap_or_default();

            PushConsumer::new(stream_id, subscription_id, topic, dispatcher)
                .start(cancel)
                .await?;
        }
    }
    Ok(())
}
