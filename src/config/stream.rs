//! Stream definitions.
//!
//! Field names of the legacy JSON configuration are accepted as aliases:
//!
//! ```yaml
//! streams:
//!   - enabled: true
//!     type: dynamo            # or spanner
//!     stream_arn: arn:aws:dynamodb:...
//!     dynamo_table_name: users
//!     project: my-project     # spanner only
//!     subscriptionId: users-sub
//! ```

use std::fmt;

use serde::Deserialize;

use super::ConfigError;
use crate::model::Checkpoint;

/// Which way changes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Consume a DynamoDB stream and write to the target API.
    #[serde(alias = "dynamo")]
    Pull,
    /// Consume a Pub/Sub subscription and write to DynamoDB.
    #[serde(alias = "spanner")]
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Pull => f.write_str("pull"),
            Direction::Push => f.write_str("push"),
        }
    }
}

/// Position to resume a pull stream from on first start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InitialCheckpoint {
    pub last_shard_id: Option<String>,
    pub last_sequence_number: Option<String>,
}

impl InitialCheckpoint {
    /// The checkpoint, when both fields are set.
    pub fn to_checkpoint(&self) -> Option<Checkpoint> {
        match (&self.last_shard_id, &self.last_sequence_number) {
            (Some(shard_id), Some(sequence_number)) => {
                Some(Checkpoint::new(shard_id, sequence_number))
            }
            _ => None,
        }
    }
}

/// Pub/Sub subscription of a push stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushTopicConfig {
    #[serde(default)]
    pub project: String,
    #[serde(alias = "subscriptionId", alias = "subscriptionid")]
    pub subscription_id: String,
}

#[derive(Deserialize)]
struct RawStreamDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(alias = "type")]
    direction: Direction,
    #[serde(alias = "dynamo_table_name")]
    table_name: String,
    #[serde(default, alias = "stream_arn")]
    source_stream_id: Option<String>,
    #[serde(default, alias = "checkpoint")]
    initial_checkpoint: Option<InitialCheckpoint>,
    #[serde(default)]
    push_topic: Option<PushTopicConfig>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default, alias = "subscriptionId", alias = "subscriptionid")]
    subscription_id: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// One replication stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStreamDefinition")]
pub struct StreamDefinition {
    /// Explicit stream id; defaults to `<direction>-<table_name>`.
    pub name: Option<String>,
    pub enabled: bool,
    pub direction: Direction,
    /// Table the changes are written to.
    pub table_name: String,
    /// Source stream (ARN for DynamoDB Streams); pull only.
    pub source_stream_id: Option<String>,
    pub initial_checkpoint: Option<InitialCheckpoint>,
    /// Subscription to consume; push only.
    pub push_topic: Option<PushTopicConfig>,
}

impl From<RawStreamDefinition> for StreamDefinition {
    fn from(raw: RawStreamDefinition) -> Self {
        let push_topic = raw.push_topic.or_else(|| {
            raw.subscription_id.map(|subscription_id| PushTopicConfig {
                project: raw.project.unwrap_or_default(),
                subscription_id,
            })
        });

        Self {
            name: raw.name,
            enabled: raw.enabled,
            direction: raw.direction,
            table_name: raw.table_name,
            source_stream_id: raw.source_stream_id,
            initial_checkpoint: raw.initial_checkpoint,
            push_topic,
        }
    }
}

impl StreamDefinition {
    /// Identifier used in logs and as the checkpoint key.
    pub fn stream_id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.direction, self.table_name),
        }
    }

    /// Configured resume position, if complete.
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        self.initial_checkpoint
            .as_ref()
            .and_then(InitialCheckpoint::to_checkpoint)
    }

    /// Check that the definition has what its direction needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            stream: self.stream_id(),
            reason: reason.to_string(),
        };

        if self.table_name.trim().is_empty() {
            return Err(invalid("table_name is empty"));
        }

        match self.direction {
            Direction::Pull => {
                if self
                    .source_stream_id
                    .as_deref()
                    .map_or(true, |id| id.trim().is_empty())
                {
                    return Err(invalid("pull stream requires source_stream_id"));
                }
            }
            Direction::Push => match &self.push_topic {
                Some(topic) if !topic.subscription_id.trim().is_empty() => {}
                _ => return Err(invalid("push stream requires push_topic.subscription_id")),
            },
        }
        Ok(())
    }
}
