//! Shard scheduling and consumption.
//!
//! The scheduler loop promotes ready shards, then gives every in-process
//! shard one turn. A turn reads pages until the shard is exhausted or has
//! been quiet for `empty_read_threshold` consecutive pages. Shards are
//! consumed one at a time, so records within a shard are applied in order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{ReplicationError, ReplicationSettings, ShardBuckets};
use crate::checkpoint::CheckpointStore;
use crate::dispatch::RecordDispatcher;
use crate::model::{ChangeRecord, Checkpoint, Shard};
use crate::source::{IteratorPosition, StreamSource};

/// How a shard's turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardOutcome {
    /// The source has no further iterator: the shard is closed and drained.
    Exhausted,
    /// The shard went quiet or the turn was cancelled; it stays in process.
    Yielded,
}

pub struct ShardScheduler {
    stream_id: String,
    source: Arc<dyn StreamSource>,
    dispatcher: RecordDispatcher,
    buckets: Arc<ShardBuckets>,
    settings: ReplicationSettings,
    store: Option<Arc<dyn CheckpointStore>>,
    initial_checkpoint: Option<Checkpoint>,
}

impl ShardScheduler {
    pub fn new(
        stream_id: impl Into<String>,
        source: Arc<dyn StreamSource>,
        dispatcher: RecordDispatcher,
        buckets: Arc<ShardBuckets>,
        settings: ReplicationSettings,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            source,
            dispatcher,
            buckets,
            settings,
            store: None,
            initial_checkpoint: None,
        }
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_initial_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.initial_checkpoint = Some(checkpoint);
        self
    }

    /// Seed the buckets' checkpoints: the configured one first, then the store's.
    pub async fn restore(&self) {
        if let Some(checkpoint) = &self.initial_checkpoint {
            self.buckets.advance(checkpoint).await;
        }

        let Some(store) = &self.store else {
            return;
        };

        match store.load(&self.stream_id).await {
            Ok(checkpoints) => {
                info!(
                    stream = %self.stream_id,
                    shards = checkpoints.len(),
                    "Restored checkpoints"
                );
                self.buckets.seed_checkpoints(checkpoints).await;
            }
            Err(e) => {
                warn!(stream = %self.stream_id, error = %e, "Failed to load checkpoints");
            }
        }
    }

    /// One promotion pass over *discovered*.
    pub async fn promote(&self) -> Vec<Shard> {
        let promoted = self
            .buckets
            .promote(self.settings.adopt_orphaned_shards)
            .await;
        for shard in &promoted {
            info!(
                stream = %self.stream_id,
                shard_id = %shard.id,
                parent_id = ?shard.parent_id,
                "Shard in process"
            );
        }
        promoted
    }

    /// Give one shard a turn.
    #[instrument(skip(self, shard, cancel), fields(stream = %self.stream_id, shard_id = %shard.id))]
    pub async fn consume(
        &self,
        shard: &Shard,
        cancel: &CancellationToken,
    ) -> Result<ShardOutcome, ReplicationError> {
        let position = match self.buckets.checkpoint(&shard.id).await {
            Some(sequence_number) => IteratorPosition::AfterSequenceNumber(sequence_number),
            None => IteratorPosition::TrimHorizon,
        };
        debug!(position = ?position, "Opening shard iterator");

        let mut iterator = self
            .source
            .get_iterator(&shard.id, position)
            .await
            .map_err(|source| ReplicationError::Iterator {
                shard_id: shard.id.clone(),
                source,
            })?;

        let threshold = self.settings.empty_read_threshold.max(1);
        let mut empty_reads = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(ShardOutcome::Yielded);
            }

            let page = self.source.get_records(&iterator).await.map_err(|source| {
                ReplicationError::Records {
                    shard_id: shard.id.clone(),
                    source,
                }
            })?;

            if page.records.is_empty() {
                empty_reads += 1;
            } else {
                empty_reads = 0;
                for record in page.records {
                    if cancel.is_cancelled() {
                        return Ok(ShardOutcome::Yielded);
                    }
                    let checkpoint = Checkpoint::new(&shard.id, &record.sequence_number);
                    let change = ChangeRecord::from_stream(&shard.id, record);
                    self.dispatcher.dispatch(&change).await?;
                    self.advance(&checkpoint).await;
                }
            }

            let Some(next) = page.next_iterator else {
                info!("Shard exhausted");
                return Ok(ShardOutcome::Exhausted);
            };
            iterator = next;

            if empty_reads >= threshold {
                debug!(empty_reads, "Shard quiet, yielding");
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.yield_delay) => {}
                }
                return Ok(ShardOutcome::Yielded);
            }
        }
    }

    async fn advance(&self, checkpoint: &Checkpoint) {
        self.buckets.advance(checkpoint).await;

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.stream_id, checkpoint).await {
                warn!(
                    stream = %self.stream_id,
                    shard_id = %checkpoint.shard_id,
                    error = %e,
                    "Failed to save checkpoint"
                );
            }
        }
    }

    /// Restore checkpoints, then schedule shards until cancelled or a turn fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ReplicationError> {
        self.restore().await;
        let result = self.schedule(&cancel).await;

        if let Some(store) = &self.store {
            if let Err(e) = store.flush(&self.stream_id).await {
                warn!(stream = %self.stream_id, error = %e, "Failed to flush checkpoints");
            }
        }
        result
    }

    async fn schedule(&self, cancel: &CancellationToken) -> Result<(), ReplicationError> {
        while !cancel.is_cancelled() {
            self.promote().await;

            let shards = self.buckets.in_process().await;
            if shards.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.settings.idle_delay) => {}
                }
                continue;
            }

            for shard in shards {
                if cancel.is_cancelled() {
                    break;
                }
                if self.consume(&shard, cancel).await? == ShardOutcome::Exhausted {
                    self.buckets.complete(&shard.id).await;
                    info!(stream = %self.stream_id, shard_id = %shard.id, "Shard processed");
                }
            }
        }

        debug!(stream = %self.stream_id, "Shard scheduler cancelled");
        Ok(())
    }
}
