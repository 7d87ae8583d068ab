//! Write API of the store being replicated into.
//!
//! This module contains:
//! - `TargetAdapter` trait: put/update/delete by key
//! - `TargetError`: typed failures returned by adapters
//! - Implementations: HTTP (DynamoDB-compatible adapter API), DynamoDB, Mock

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{AttributeValue, Item};

#[cfg(feature = "dynamo")]
pub mod dynamo;
pub mod http;
pub mod mock;

#[cfg(feature = "dynamo")]
pub use dynamo::DynamoTargetAdapter;
pub use http::{HttpTargetAdapter, HttpTargetConfig};
pub use mock::{MockTargetAdapter, TargetCall};

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;

/// Errors returned by a target adapter.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Request(String),
}

impl TargetError {
    /// Whether retrying the same write could succeed.
    ///
    /// Transport failures and 5xx/429 responses are transient; any other
    /// rejection means the write itself is bad.
    pub fn is_transient(&self) -> bool {
        match self {
            TargetError::Transport(_) => true,
            TargetError::Rejected { status, .. } => *status >= 500 || *status == 429,
            TargetError::Serialization(_) | TargetError::Request(_) => false,
        }
    }
}

/// Action applied to one attribute by an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateAction {
    Put,
    Add,
    Delete,
}

/// One attribute update, in the DynamoDB `AttributeUpdates` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    #[serde(rename = "Value", skip_serializing_if = "Option::is_none")]
    pub value: Option<AttributeValue>,
    #[serde(rename = "Action")]
    pub action: UpdateAction,
}

impl AttributeUpdate {
    pub fn put(value: AttributeValue) -> Self {
        Self {
            value: Some(value),
            action: UpdateAction::Put,
        }
    }

    pub fn delete() -> Self {
        Self {
            value: None,
            action: UpdateAction::Delete,
        }
    }
}

/// Attribute updates keyed by attribute name.
pub type AttributeUpdates = HashMap<String, AttributeUpdate>;

/// Narrow write API of the replicated-into store.
///
/// Implementations must be safe to call concurrently from several
/// dispatchers (one per stream).
///
/// Implementations:
/// - `HttpTargetAdapter`: the adapter's DynamoDB-compatible HTTP API
/// - `DynamoTargetAdapter`: DynamoDB itself (push direction)
/// - `MockTargetAdapter`: In-memory recorder for testing
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    /// Insert or replace the whole item.
    async fn put(&self, table_name: &str, item: Item) -> Result<()>;

    /// Apply attribute updates to the item with the given key.
    async fn update(&self, table_name: &str, key: Item, updates: AttributeUpdates) -> Result<()>;

    /// Delete the item with the given key.
    async fn delete(&self, table_name: &str, key: Item) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(TargetError::Transport("reset".to_string()).is_transient());
        assert!(TargetError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(TargetError::Rejected {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!TargetError::Rejected {
            status: 400,
            body: "ValidationException".to_string()
        }
        .is_transient());
        assert!(!TargetError::Request("bad".to_string()).is_transient());
    }

    #[test]
    fn test_attribute_update_shape() {
        let update = AttributeUpdate::put(AttributeValue::N("2".to_string()));
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"Value": {"N": "2"}, "Action": "PUT"})
        );

        let update = AttributeUpdate::delete();
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({"Action": "DELETE"})
        );
    }
}
