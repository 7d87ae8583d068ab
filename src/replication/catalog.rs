//! Shard discovery.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ReplicationError, ShardBuckets};
use crate::source::StreamSource;

/// Periodically pages the stream topology into *discovered*.
pub struct ShardCatalog {
    stream_id: String,
    source: Arc<dyn StreamSource>,
    buckets: Arc<ShardBuckets>,
    initial_delay: Duration,
    interval: Duration,
}

impl ShardCatalog {
    pub fn new(
        stream_id: impl Into<String>,
        source: Arc<dyn StreamSource>,
        buckets: Arc<ShardBuckets>,
        initial_delay: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            source,
            buckets,
            initial_delay,
            interval,
        }
    }

    /// Page through the whole topology once, proposing every shard.
    ///
    /// Returns the number of shards that were not known before. Known shards
    /// are skipped, so repeated refreshes are harmless.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<usize, ReplicationError> {
        let mut cursor: Option<String> = None;
        let mut discovered = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(discovered);
            }

            let page = self
                .source
                .describe_topology(cursor.as_deref())
                .await
                .map_err(|source| ReplicationError::Topology {
                    stream: self.stream_id.clone(),
                    source,
                })?;

            for shard in page.shards {
                let shard_id = shard.id.clone();
                let parent_id = shard.parent_id.clone();
                if self.buckets.propose(shard).await {
                    info!(
                        stream = %self.stream_id,
                        shard_id = %shard_id,
                        parent_id = ?parent_id,
                        "Discovered shard"
                    );
                    discovered += 1;
                }
            }

            match page.last_evaluated_shard_id {
                Some(last) => cursor = Some(last),
                None => break,
            }
        }

        self.buckets.mark_topology_complete().await;
        debug!(stream = %self.stream_id, discovered, "Topology refresh complete");
        Ok(discovered)
    }

    /// Refresh after the initial delay, then on every interval, until cancelled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ReplicationError> {
        let mut delay = self.initial_delay;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(stream = %self.stream_id, "Shard catalog cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }

            self.refresh(&cancel).await?;
            delay = self.interval;
        }
    }
}
