//! Pull-direction replication.
//!
//! A `PullReplicator` runs two cooperating tasks over one source stream:
//! - `ShardCatalog` pages the stream topology and proposes new shards
//! - `ShardScheduler` promotes shards parent-first and consumes them
//!
//! Both share a `ShardBuckets` and a cancellation token; either one failing
//! stops the other.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::checkpoint::CheckpointStore;
use crate::dispatch::{DispatchError, RecordDispatcher};
use crate::model::Checkpoint;
use crate::source::{SourceError, StreamSource};

pub mod catalog;
pub mod scheduler;
pub mod state;

pub use catalog::ShardCatalog;
pub use scheduler::{ShardOutcome, ShardScheduler};
pub use state::{ShardBuckets, ShardState};

/// Errors that end a pull stream.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("Topology refresh of {stream} failed: {source}")]
    Topology {
        stream: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed to obtain iterator for shard {shard_id}: {source}")]
    Iterator {
        shard_id: String,
        #[source]
        source: SourceError,
    },

    #[error("Failed to read records from shard {shard_id}: {source}")]
    Records {
        shard_id: String,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Replication task failed: {0}")]
    Task(String),
}

/// Timing and policy knobs of a pull stream.
#[derive(Debug, Clone)]
pub struct ReplicationSettings {
    /// Consecutive empty pages after which a shard yields.
    pub empty_read_threshold: u32,
    pub refresh_initial_delay: Duration,
    pub refresh_interval: Duration,
    /// Pause before a quiet shard gives up its turn.
    pub yield_delay: Duration,
    /// Pause when no shard is in process.
    pub idle_delay: Duration,
    /// Promote shards whose parent has been trimmed from the stream.
    pub adopt_orphaned_shards: bool,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            empty_read_threshold: 5,
            refresh_initial_delay: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(10),
            yield_delay: Duration::from_secs(5),
            idle_delay: Duration::from_secs(1),
            adopt_orphaned_shards: false,
        }
    }
}

/// Catalog and scheduler of one pull stream.
pub struct PullReplicator {
    stream_id: String,
    catalog: ShardCatalog,
    scheduler: ShardScheduler,
    buckets: Arc<ShardBuckets>,
}

impl PullReplicator {
    pub fn new(
        stream_id: impl Into<String>,
        source: Arc<dyn StreamSource>,
        dispatcher: RecordDispatcher,
        settings: ReplicationSettings,
    ) -> Self {
        let stream_id = stream_id.into();
        let buckets = Arc::new(ShardBuckets::new());
        let catalog = ShardCatalog::new(
            stream_id.clone(),
            source.clone(),
            buckets.clone(),
            settings.refresh_initial_delay,
            settings.refresh_interval,
        );
        let scheduler = ShardScheduler::new(
            stream_id.clone(),
            source,
            dispatcher,
            buckets.clone(),
            settings,
        );

        Self {
            stream_id,
            catalog,
            scheduler,
            buckets,
        }
    }

    /// Persist checkpoints to the given store and resume from it.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.scheduler = self.scheduler.with_checkpoint_store(store);
        self
    }

    /// Resume position used when the store has none for that shard.
    pub fn with_initial_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.scheduler = self.scheduler.with_initial_checkpoint(checkpoint);
        self
    }

    pub fn buckets(&self) -> Arc<ShardBuckets> {
        self.buckets.clone()
    }

    /// Run until cancelled or until either task fails.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), ReplicationError> {
        let token = cancel.child_token();
        let stream_id = self.stream_id;

        info!(stream = %stream_id, "Starting pull replication");

        let catalog = self.catalog;
        let catalog_token = token.clone();
        let catalog_task = tokio::spawn(async move {
            let result = catalog.run(catalog_token.clone()).await;
            catalog_token.cancel();
            result
        });

        let scheduler = self.scheduler;
        let scheduler_token = token.clone();
        let scheduler_task = tokio::spawn(async move {
            let result = scheduler.run(scheduler_token.clone()).await;
            scheduler_token.cancel();
            result
        });

        let (catalog_result, scheduler_result) = tokio::join!(catalog_task, scheduler_task);
        let catalog_result = flatten(catalog_result);
        let scheduler_result = flatten(scheduler_result);

        match (&scheduler_result, &catalog_result) {
            (Err(e), _) | (Ok(()), Err(e)) => {
                error!(stream = %stream_id, error = %e, "Pull replication stopped with error");
            }
            (Ok(()), Ok(())) => info!(stream = %stream_id, "Pull replication stopped"),
        }

        scheduler_result.and(catalog_result)
    }
}

fn flatten(
    result: Result<Result<(), ReplicationError>, tokio::task::JoinError>,
) -> Result<(), ReplicationError> {
    result.map_err(|e| ReplicationError::Task(e.to_string()))?
}
