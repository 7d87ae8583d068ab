//! DynamoDB target adapter.
//!
//! Used by the push direction: changes made on the target store are written
//! back into DynamoDB through its native write API.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeAction, AttributeValue as SdkValue, AttributeValueUpdate,
};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use super::{AttributeUpdates, Result, TargetAdapter, TargetError, UpdateAction};
use crate::model::{AttributeValue, Item};

/// DynamoDB implementation of TargetAdapter.
pub struct DynamoTargetAdapter {
    client: Client,
}

impl DynamoTargetAdapter {
    /// Create a new DynamoDB target adapter.
    pub async fn new(endpoint_url: Option<&str>, region: Option<&str>) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let client = if let Some(endpoint) = endpoint_url {
            let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(dynamo_config)
        } else {
            Client::new(&config)
        };

        info!(endpoint = ?endpoint_url, "Connected to DynamoDB as replication target");

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_sdk(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s),
        AttributeValue::N(n) => SdkValue::N(n),
        AttributeValue::B(b) => SdkValue::B(Blob::new(b)),
        AttributeValue::Bool(b) => SdkValue::Bool(b),
        AttributeValue::Null(n) => SdkValue::Null(n),
        AttributeValue::L(values) => SdkValue::L(values.into_iter().map(to_sdk).collect()),
        AttributeValue::M(item) => SdkValue::M(to_sdk_item(item)),
        AttributeValue::Ss(set) => SdkValue::Ss(set),
        AttributeValue::Ns(set) => SdkValue::Ns(set),
        AttributeValue::Bs(set) => SdkValue::Bs(set.into_iter().map(Blob::new).collect()),
    }
}

fn to_sdk_item(item: Item) -> HashMap<String, SdkValue> {
    item.into_iter().map(|(k, v)| (k, to_sdk(v))).collect()
}

fn to_sdk_action(action: UpdateAction) -> AttributeAction {
    match action {
        UpdateAction::Put => AttributeAction::Put,
        UpdateAction::Add => AttributeAction::Add,
        UpdateAction::Delete => AttributeAction::Delete,
    }
}

#[async_trait]
impl TargetAdapter for DynamoTargetAdapter {
    async fn put(&self, table_name: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(to_sdk_item(item)))
            .send()
            .await
            .map_err(|e| TargetError::Request(format!("DynamoDB put_item failed: {}", e)))?;

        debug!(table = %table_name, "Stored item in DynamoDB");
        Ok(())
    }

    async fn update(&self, table_name: &str, key: Item, updates: AttributeUpdates) -> Result<()> {
        let updates: HashMap<String, AttributeValueUpdate> = updates
            .into_iter()
            .map(|(name, update)| {
                let sdk_update = AttributeValueUpdate::builder()
                    .set_value(update.value.map(to_sdk))
                    .action(to_sdk_action(update.action))
                    .build();
                (name, sdk_update)
            })
            .collect();

        self.client
            .update_item()
            .table_name(table_name)
            .set_key(Some(to_sdk_item(key)))
            .set_attribute_updates(Some(updates))
            .send()
            .await
            .map_err(|e| TargetError::Request(format!("DynamoDB update_item failed: {}", e)))?;

        debug!(table = %table_name, "Updated item in DynamoDB");
        Ok(())
    }

    async fn delete(&self, table_name: &str, key: Item) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table_name)
            .set_key(Some(to_sdk_item(key)))
            .send()
            .await
            .map_err(|e| TargetError::Request(format!("DynamoDB delete_item failed: {}", e)))?;

        debug!(table = %table_name, "Deleted item from DynamoDB");
        Ok(())
    }
}
