//! Shard lifecycle buckets and checkpoints of one pull stream.
//!
//! Every known shard sits in exactly one of three buckets: discovered,
//! in-process or processed. The catalog only proposes new shards; the
//! scheduler moves them and advances checkpoints. Buckets are ordered maps so
//! passes over them are deterministic.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use crate::model::{Checkpoint, Shard};

/// Lifecycle state of a shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    Discovered,
    InProcess,
    Processed,
}

#[derive(Default)]
struct BucketState {
    discovered: BTreeMap<String, Shard>,
    in_process: BTreeMap<String, Shard>,
    processed: BTreeMap<String, Shard>,
    checkpoints: HashMap<String, String>,
    /// Set once a refresh has paged through the whole topology.
    topology_complete: bool,
}

impl BucketState {
    fn state_of(&self, shard_id: &str) -> Option<ShardState> {
        if self.discovered.contains_key(shard_id) {
            Some(ShardState::Discovered)
        } else if self.in_process.contains_key(shard_id) {
            Some(ShardState::InProcess)
        } else if self.processed.contains_key(shard_id) {
            Some(ShardState::Processed)
        } else {
            None
        }
    }
}

/// Shared shard state of one stream.
#[derive(Default)]
pub struct ShardBuckets {
    inner: RwLock<BucketState>,
}

impl ShardBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shard to *discovered* unless it is already known.
    ///
    /// Returns whether the shard was new.
    pub async fn propose(&self, shard: Shard) -> bool {
        let mut state = self.inner.write().await;
        if state.state_of(&shard.id).is_some() {
            return false;
        }
        state.discovered.insert(shard.id.clone(), shard);
        true
    }

    /// Record that a refresh has seen the full topology.
    pub async fn mark_topology_complete(&self) {
        self.inner.write().await.topology_complete = true;
    }

    /// One promotion pass: move every discovered shard whose parent is absent
    /// or processed into *in-process*.
    ///
    /// With `adopt_orphans`, a shard whose parent is unknown to all buckets is
    /// promoted too, once the full topology has been seen at least once.
    pub async fn promote(&self, adopt_orphans: bool) -> Vec<Shard> {
        let mut guard = self.inner.write().await;
        let state = &mut *guard;

        let ready: Vec<String> = state
            .discovered
            .values()
            .filter(|shard| match &shard.parent_id {
                None => true,
                Some(parent) => match state.state_of(parent) {
                    Some(ShardState::Processed) => true,
                    None => adopt_orphans && state.topology_complete,
                    Some(_) => false,
                },
            })
            .map(|shard| shard.id.clone())
            .collect();

        let mut promoted = Vec::with_capacity(ready.len());
        for id in ready {
            if let Some(shard) = state.discovered.remove(&id) {
                state.in_process.insert(id, shard.clone());
                promoted.push(shard);
            }
        }
        promoted
    }

    /// Snapshot of *in-process*, in id order.
    pub async fn in_process(&self) -> Vec<Shard> {
        self.inner.read().await.in_process.values().cloned().collect()
    }

    /// Move a shard from *in-process* to *processed*.
    pub async fn complete(&self, shard_id: &str) -> bool {
        let mut state = self.inner.write().await;
        match state.in_process.remove(shard_id) {
            Some(shard) => {
                state.processed.insert(shard_id.to_string(), shard);
                true
            }
            None => false,
        }
    }

    pub async fn state_of(&self, shard_id: &str) -> Option<ShardState> {
        self.inner.read().await.state_of(shard_id)
    }

    /// Number of shards in each bucket: (discovered, in-process, processed).
    pub async fn counts(&self) -> (usize, usize, usize) {
        let state = self.inner.read().await;
        (
            state.discovered.len(),
            state.in_process.len(),
            state.processed.len(),
        )
    }

    /// Last applied sequence number of a shard.
    pub async fn checkpoint(&self, shard_id: &str) -> Option<String> {
        self.inner.read().await.checkpoints.get(shard_id).cloned()
    }

    pub async fn advance(&self, checkpoint: &Checkpoint) {
        self.inner.write().await.checkpoints.insert(
            checkpoint.shard_id.clone(),
            checkpoint.sequence_number.clone(),
        );
    }

    /// Seed checkpoints, overwriting existing entries for the same shards.
    pub async fn seed_checkpoints(&self, checkpoints: HashMap<String, String>) {
        self.inner.write().await.checkpoints.extend(checkpoints);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_propose_is_idempotent() {
        let buckets = ShardBuckets::new();
        assert!(buckets.propose(Shard::root("a")).await);
        assert!(!buckets.propose(Shard::root("a")).await);

        buckets.promote(false).await;
        assert!(!buckets.propose(Shard::root("a")).await);
        assert_eq!(buckets.counts().await, (0, 1, 0));
    }

    #[tokio::test]
    async fn test_child_waits_for_parent() {
        let buckets = ShardBuckets::new();
        buckets.propose(Shard::root("a")).await;
        buckets.propose(Shard::child("b", "a")).await;

        let promoted = buckets.promote(false).await;
        assert_eq!(promoted, vec![Shard::root("a")]);
        assert_eq!(buckets.state_of("b").await, Some(ShardState::Discovered));

        assert!(buckets.promote(false).await.is_empty());

        buckets.complete("a").await;
        let promoted = buckets.promote(false).await;
        assert_eq!(promoted, vec![Shard::child("b", "a")]);
    }

    #[tokio::test]
    async fn test_orphan_adoption_requires_complete_topology() {
        let buckets = ShardBuckets::new();
        buckets.propose(Shard::child("b", "trimmed")).await;

        assert!(buckets.promote(false).await.is_empty());
        assert!(buckets.promote(true).await.is_empty());

        buckets.mark_topology_complete().await;
        assert!(buckets.promote(false).await.is_empty());
        assert_eq!(buckets.promote(true).await.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_requires_in_process() {
        let buckets = ShardBuckets::new();
        buckets.propose(Shard::root("a")).await;
        assert!(!buckets.complete("a").await);
        assert_eq!(buckets.state_of("a").await, Some(ShardState::Discovered));
    }

    #[tokio::test]
    async fn test_checkpoints() {
        let buckets = ShardBuckets::new();
        assert!(buckets.checkpoint("a").await.is_none());

        buckets.advance(&Checkpoint::new("a", "100")).await;
        buckets.advance(&Checkpoint::new("a", "200")).await;
        assert_eq!(buckets.checkpoint("a").await.as_deref(), Some("200"));

        buckets
            .seed_checkpoints(HashMap::from([("b".to_string(), "7".to_string())]))
            .await;
        assert_eq!(buckets.checkpoint("b").await.as_deref(), Some("7"));
    }
}
