//! DynamoDB Streams source.
//!
//! Wraps `DescribeStream`, `GetShardIterator` and `GetRecords` of one stream
//! ARN. Records are converted to the crate's attribute model as they are read.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodbstreams::types::{
    AttributeValue as SdkValue, OperationType, Record, ShardIteratorType,
};
use aws_sdk_dynamodbstreams::Client;
use tracing::{debug, info};

use super::{IteratorPosition, RecordsPage, Result, SourceError, StreamSource, TopologyPage};
use crate::model::{AttributeValue, EventKind, Item, Shard, StreamRecord};

/// DynamoDB Streams implementation of StreamSource.
pub struct DynamoStreamSource {
    client: Client,
    stream_arn: String,
}

impl DynamoStreamSource {
    /// Create a new source for one stream ARN.
    pub async fn new(
        stream_arn: impl Into<String>,
        endpoint_url: Option<&str>,
        region: Option<&str>,
    ) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let client = if let Some(endpoint) = endpoint_url {
            let streams_config = aws_sdk_dynamodbstreams::config::Builder::from(&config)
                .endpoint_url(endpoint)
                .build();
            Client::from_conf(streams_config)
        } else {
            Client::new(&config)
        };

        let stream_arn = stream_arn.into();
        info!(stream = %stream_arn, "Connected to DynamoDB Streams");

        Ok(Self { client, stream_arn })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client, stream_arn: impl Into<String>) -> Self {
        Self {
            client,
            stream_arn: stream_arn.into(),
        }
    }
}

fn from_sdk(value: &SdkValue) -> Result<AttributeValue> {
    let converted = match value {
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::B(b) => AttributeValue::B(b.as_ref().to_vec()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::Null(n) => AttributeValue::Null(*n),
        SdkValue::L(values) => {
            AttributeValue::L(values.iter().map(from_sdk).collect::<Result<_>>()?)
        }
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::Ss(set) => AttributeValue::Ss(set.clone()),
        SdkValue::Ns(set) => AttributeValue::Ns(set.clone()),
        SdkValue::Bs(set) => AttributeValue::Bs(set.iter().map(|b| b.as_ref().to_vec()).collect()),
        other => {
            return Err(SourceError::Malformed(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    };
    Ok(converted)
}

fn from_sdk_item(map: &HashMap<String, SdkValue>) -> Result<Item> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), from_sdk(v)?)))
        .collect()
}

fn event_kind(operation: &OperationType) -> Result<EventKind> {
    match operation {
        OperationType::Insert => Ok(EventKind::Insert),
        OperationType::Modify => Ok(EventKind::Modify),
        OperationType::Remove => Ok(EventKind::Remove),
        other => Err(SourceError::Malformed(format!(
            "Unknown operation type: {}",
            other.as_str()
        ))),
    }
}

fn convert_record(record: &Record) -> Result<StreamRecord> {
    let operation = record
        .event_name()
        .ok_or_else(|| SourceError::Malformed("Record without event name".to_string()))?;
    let body = record
        .dynamodb()
        .ok_or_else(|| SourceError::Malformed("Record without stream data".to_string()))?;
    let sequence_number = body
        .sequence_number()
        .ok_or_else(|| SourceError::Malformed("Record without sequence number".to_string()))?;

    Ok(StreamRecord {
        event_kind: event_kind(operation)?,
        keys: body.keys().map(from_sdk_item).transpose()?.unwrap_or_default(),
        new_image: body.new_image().map(from_sdk_item).transpose()?,
        old_image: body.old_image().map(from_sdk_item).transpose()?,
        sequence_number: sequence_number.to_string(),
    })
}

#[async_trait]
impl StreamSource for DynamoStreamSource {
    async fn describe_topology(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<TopologyPage> {
        let output = self
            .client
            .describe_stream()
            .stream_arn(&self.stream_arn)
            .set_exclusive_start_shard_id(exclusive_start_shard_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| SourceError::Request(format!("DescribeStream failed: {}", e)))?;

        let description = output
            .stream_description()
            .ok_or_else(|| SourceError::Malformed("DescribeStream without description".to_string()))?;

        let shards = description
            .shards()
            .iter()
            .filter_map(|shard| {
                shard.shard_id().map(|id| Shard {
                    id: id.to_string(),
                    parent_id: shard.parent_shard_id().map(str::to_string),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            stream = %self.stream_arn,
            shards = shards.len(),
            "Described stream topology page"
        );

        Ok(TopologyPage {
            shards,
            last_evaluated_shard_id: description.last_evaluated_shard_id().map(str::to_string),
        })
    }

    async fn get_iterator(&self, shard_id: &str, position: IteratorPosition) -> Result<String> {
        let request = self
            .client
            .get_shard_iterator()
            .stream_arn(&self.stream_arn)
            .shard_id(shard_id);

        let request = match position {
            IteratorPosition::TrimHorizon => {
                request.shard_iterator_type(ShardIteratorType::TrimHorizon)
            }
            IteratorPosition::AfterSequenceNumber(sequence) => request
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .sequence_number(sequence),
        };

        let output = request
            .send()
            .await
            .map_err(|e| SourceError::Request(format!("GetShardIterator failed: {}", e)))?;

        output
            .shard_iterator()
            .map(str::to_string)
            .ok_or_else(|| SourceError::Malformed(format!("No iterator returned for shard {}", shard_id)))
    }

    async fn get_records(&self, iterator: &str) -> Result<RecordsPage> {
        let output = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.as_service_error();
                if service_error.map(|s| s.is_expired_iterator_exception()).unwrap_or(false) {
                    SourceError::ExpiredIterator(iterator.to_string())
                } else {
                    SourceError::Request(format!("GetRecords failed: {}", e))
                }
            })?;

        let records = output
            .records()
            .iter()
            .map(convert_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordsPage {
            records,
            next_iterator: output.next_shard_iterator().map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodbstreams::types::StreamRecord as SdkStreamRecord;

    #[test]
    fn test_convert_insert_record() {
        let record = Record::builder()
            .event_name(OperationType::Insert)
            .dynamodb(
                SdkStreamRecord::builder()
                    .keys("id", SdkValue::S("1".to_string()))
                    .new_image("id", SdkValue::S("1".to_string()))
                    .new_image("count", SdkValue::N("2".to_string()))
                    .sequence_number("100")
                    .build(),
            )
            .build();

        let converted = convert_record(&record).unwrap();
        assert_eq!(converted.event_kind, EventKind::Insert);
        assert_eq!(converted.sequence_number, "100");
        assert_eq!(converted.keys["id"], AttributeValue::S("1".to_string()));
        let image = converted.new_image.unwrap();
        assert_eq!(image["count"], AttributeValue::N("2".to_string()));
        assert!(converted.old_image.is_none());
    }

    #[test]
    fn test_record_without_sequence_is_malformed() {
        let record = Record::builder()
            .event_name(OperationType::Remove)
            .dynamodb(SdkStreamRecord::builder().build())
            .build();

        assert!(matches!(
            convert_record(&record),
            Err(SourceError::Malformed(_))
        ));
    }
}
