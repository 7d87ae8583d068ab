//! Replication data model.
//!
//! Shards, checkpoints and the normalized change record that flows from a
//! source (shard consumption or push-message decoding) to the dispatcher.

mod attribute;

pub use attribute::{item_from_json, AttributeValue, Item};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A partition of the source change stream.
///
/// Shards form a parent/child DAG as the stream splits; a child's records are
/// causally after its parent's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shard {
    pub id: String,
    pub parent_id: Option<String>,
}

impl Shard {
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
        }
    }

    pub fn child(id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
        }
    }
}

/// Resume position of one shard: the last successfully applied sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub shard_id: String,
    pub sequence_number: String,
}

impl Checkpoint {
    pub fn new(shard_id: impl Into<String>, sequence_number: impl Into<String>) -> Self {
        Self {
            shard_id: shard_id.into(),
            sequence_number: sequence_number.into(),
        }
    }
}

/// Kind of change carried by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Insert,
    Modify,
    Remove,
}

impl EventKind {
    /// DynamoDB operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Insert => "INSERT",
            EventKind::Modify => "MODIFY",
            EventKind::Remove => "REMOVE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event name that is not one of INSERT, MODIFY or REMOVE.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event name: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(EventKind::Insert),
            "MODIFY" => Ok(EventKind::Modify),
            "REMOVE" => Ok(EventKind::Remove),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

/// A record as returned by the source stream, before it is tied to a shard.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub event_kind: EventKind,
    pub keys: Item,
    pub new_image: Option<Item>,
    pub old_image: Option<Item>,
    pub sequence_number: String,
}

/// Normalized representation of one change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub shard_id: String,
    pub event_kind: EventKind,
    pub keys: Item,
    pub new_image: Option<Item>,
    pub old_image: Option<Item>,
    pub sequence_number: String,
}

impl ChangeRecord {
    /// Attach a source record to the shard it was read from.
    pub fn from_stream(shard_id: impl Into<String>, record: StreamRecord) -> Self {
        Self {
            shard_id: shard_id.into(),
            event_kind: record.event_kind,
            keys: record.keys,
            new_image: record.new_image,
            old_image: record.old_image,
            sequence_number: record.sequence_number,
        }
    }
}
