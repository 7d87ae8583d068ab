//! cdc-replicator - change-data-capture replication engine
//!
//! Keeps two stores in sync:
//! - Pull: a shard-partitioned DynamoDB stream is consumed parent-first and
//!   every change is applied to a DynamoDB-compatible write API
//! - Push: change notifications from a Pub/Sub subscription are applied back
//!   to DynamoDB
//!
//! The engine depends only on the `StreamSource`, `TargetAdapter`,
//! `PushTopic` and `CheckpointStore` traits; real clients sit behind the
//! `dynamo` and `pubsub` features.

pub mod checkpoint;
pub mod config;
pub mod connectors;
pub mod dispatch;
pub mod model;
pub mod orchestrator;
pub mod push;
pub mod replication;
pub mod source;
pub mod target;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use dispatch::{DispatchError, RecordDispatcher};
pub use orchestrator::{Orchestrator, OrchestratorError, StreamHandle};
pub use replication::{PullReplicator, ReplicationError, ShardOutcome};
