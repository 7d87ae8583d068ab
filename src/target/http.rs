//! HTTP target adapter.
//!
//! Talks to the adapter's DynamoDB-compatible API: every write is a POST of
//! DynamoDB JSON to a single endpoint, with the operation named by the
//! `X-Amz-Target` header (`DynamoDB_20120810.PutItem`, ...).
//!
//! Transport failures and 5xx responses are retried with exponential backoff;
//! 4xx responses are returned immediately as `TargetError::Rejected`.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use tracing::{debug, warn};

use super::{AttributeUpdates, Result, TargetAdapter, TargetError};
use crate::model::Item;

/// Target prefix of the DynamoDB JSON protocol.
const TARGET_PREFIX: &str = "DynamoDB_20120810";

/// Content type of the DynamoDB JSON protocol.
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Header naming the operation.
const TARGET_HEADER: &str = "X-Amz-Target";

/// Configuration for the HTTP target adapter.
#[derive(Debug, Clone)]
pub struct HttpTargetConfig {
    /// Endpoint of the adapter API (e.g. `http://localhost:9050/v1`).
    pub endpoint: String,
    /// Retries after the first attempt for transient failures.
    pub max_retries: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpTargetConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9050/v1".to_string(),
            max_retries: 3,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutItemRequest<'a> {
    table_name: &'a str,
    item: &'a Item,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateItemRequest<'a> {
    table_name: &'a str,
    key: &'a Item,
    attribute_updates: &'a AttributeUpdates,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteItemRequest<'a> {
    table_name: &'a str,
    key: &'a Item,
}

/// Target adapter backed by the adapter's HTTP API.
pub struct HttpTargetAdapter {
    client: reqwest::Client,
    config: HttpTargetConfig,
}

impl HttpTargetAdapter {
    /// Create a new HTTP target adapter.
    pub fn new(config: HttpTargetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TargetError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.config.max_retries)
            .with_jitter()
    }

    async fn send<T: Serialize>(&self, operation: &str, request: &T) -> Result<()> {
        let payload = serde_json::to_vec(request)?;

        (|| self.send_once(operation, &payload))
            .retry(self.backoff())
            .when(TargetError::is_transient)
            .notify(|err: &TargetError, delay: Duration| {
                warn!(
                    operation = %operation,
                    error = %err,
                    delay = ?delay,
                    "Target write failed, retrying"
                );
            })
            .await
    }

    async fn send_once(&self, operation: &str, payload: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(TARGET_HEADER, target_header(operation))
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| TargetError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(operation = %operation, "Target write accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(TargetError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn target_header(operation: &str) -> String {
    format!("{}.{}", TARGET_PREFIX, operation)
}

#[async_trait]
impl TargetAdapter for HttpTargetAdapter {
    async fn put(&self, table_name: &str, item: Item) -> Result<()> {
        self.send(
            "PutItem",
            &PutItemRequest {
                table_name,
                item: &item,
            },
        )
        .await
    }

    async fn update(&self, table_name: &str, key: Item, updates: AttributeUpdates) -> Result<()> {
        self.send(
            "UpdateItem",
            &UpdateItemRequest {
                table_name,
                key: &key,
                attribute_updates: &updates,
            },
        )
        .await
    }

    async fn delete(&self, table_name: &str, key: Item) -> Result<()> {
        self.send(
            "DeleteItem",
            &DeleteItemRequest {
                table_name,
                key: &key,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttributeValue;
    use crate::target::AttributeUpdate;
    use serde_json::json;

    fn key() -> Item {
        Item::from([("id".to_string(), AttributeValue::S("1".to_string()))])
    }

    #[test]
    fn test_target_header() {
        assert_eq!(target_header("PutItem"), "DynamoDB_20120810.PutItem");
    }

    #[test]
    fn test_put_request_shape() {
        let item = key();
        let request = PutItemRequest {
            table_name: "users",
            item: &item,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"TableName": "users", "Item": {"id": {"S": "1"}}})
        );
    }

    #[test]
    fn test_update_request_shape() {
        let key = key();
        let updates = AttributeUpdates::from([(
            "name".to_string(),
            AttributeUpdate::put(AttributeValue::S("x".to_string())),
        )]);
        let request = UpdateItemRequest {
            table_name: "users",
            key: &key,
            attribute_updates: &updates,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "TableName": "users",
                "Key": {"id": {"S": "1"}},
                "AttributeUpdates": {"name": {"Value": {"S": "x"}, "Action": "PUT"}}
            })
        );
    }

    #[test]
    fn test_delete_request_shape() {
        let key = key();
        let request = DeleteItemRequest {
            table_name: "users",
            key: &key,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"TableName": "users", "Key": {"id": {"S": "1"}}})
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let adapter = HttpTargetAdapter::new(HttpTargetConfig {
            endpoint: "http://127.0.0.1:1/v1".to_string(),
            max_retries: 0,
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = adapter.put("users", key()).await.unwrap_err();
        assert!(matches!(err, TargetError::Transport(_)));
        assert!(err.is_transient());
    }
}
