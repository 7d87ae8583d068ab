//! Mock target adapter for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AttributeUpdates, Result, TargetAdapter, TargetError};
use crate::model::Item;

/// A call received by the mock adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCall {
    Put {
        table_name: String,
        item: Item,
    },
    Update {
        table_name: String,
        key: Item,
        updates: AttributeUpdates,
    },
    Delete {
        table_name: String,
        key: Item,
    },
}

/// Mock target adapter that records every call in memory.
#[derive(Default)]
pub struct MockTargetAdapter {
    calls: RwLock<Vec<TargetCall>>,
    fail_on_put: RwLock<bool>,
    /// Fail only the n-th put (0-indexed) when set.
    fail_put_at: RwLock<Option<usize>>,
    puts_seen: RwLock<usize>,
}

impl MockTargetAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    /// Make the put with the given 0-based index fail; earlier puts succeed.
    pub async fn set_fail_put_at(&self, index: usize) {
        *self.fail_put_at.write().await = Some(index);
    }

    pub async fn calls(&self) -> Vec<TargetCall> {
        self.calls.read().await.clone()
    }

    pub async fn put_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, TargetCall::Put { .. }))
            .count()
    }

    pub async fn delete_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, TargetCall::Delete { .. }))
            .count()
    }

    pub async fn update_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, TargetCall::Update { .. }))
            .count()
    }
}

#[async_trait]
impl TargetAdapter for MockTargetAdapter {
    async fn put(&self, table_name: &str, item: Item) -> Result<()> {
        let index = {
            let mut seen = self.puts_seen.write().await;
            let index = *seen;
            *seen += 1;
            index
        };

        if *self.fail_on_put.read().await || *self.fail_put_at.read().await == Some(index) {
            return Err(TargetError::Rejected {
                status: 400,
                body: "Mock put failure".to_string(),
            });
        }

        self.calls.write().await.push(TargetCall::Put {
            table_name: table_name.to_string(),
            item,
        });
        Ok(())
    }

    async fn update(&self, table_name: &str, key: Item, updates: AttributeUpdates) -> Result<()> {
        self.calls.write().await.push(TargetCall::Update {
            table_name: table_name.to_string(),
            key,
            updates,
        });
        Ok(())
    }

    async fn delete(&self, table_name: &str, key: Item) -> Result<()> {
        self.calls.write().await.push(TargetCall::Delete {
            table_name: table_name.to_string(),
            key,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;

    fn key(id: &str) -> Item {
        Item::from([("id".to_string(), AttributeValue::S(id.to_string()))])
    }

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let adapter = MockTargetAdapter::new();
        adapter.put("t", key("1")).await.unwrap();
        adapter.delete("t", key("1")).await.unwrap();

        let calls = adapter.calls().await;
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], TargetCall::Put { .. }));
        assert!(matches!(calls[1], TargetCall::Delete { .. }));
        assert_eq!(adapter.put_count().await, 1);
        assert_eq!(adapter.delete_count().await, 1);
    }

    #[tokio::test]
    async fn test_fail_put_at_index() {
        let adapter = MockTargetAdapter::new();
        adapter.set_fail_put_at(1).await;

        assert!(adapter.put("t", key("1")).await.is_ok());
        assert!(adapter.put("t", key("2")).await.is_err());
        assert!(adapter.put("t", key("3")).await.is_ok());
        assert_eq!(adapter.put_count().await, 2);
    }
}
