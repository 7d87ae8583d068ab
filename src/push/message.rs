//! Push message payload.
//!
//! Messages carry one change as JSON with plain (untyped) attribute values:
//!
//! ```json
//! {"Keys": {"id": "1"}, "NewImage": {"id": "1", "n": 2}, "OldImage": null,
//!  "EventName": "INSERT", "EventId": "e-1", "Table": "users",
//!  "EventSourceArn": "...", "Timestamp": "...", "SequenceNumber": 1}
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{AttributeValue, ChangeRecord, EventKind, Item, UnknownEventKind};

/// Why a payload could not be turned into a change record.
#[derive(Debug, thiserror::Error)]
pub enum MessageDecodeError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    EventKind(#[from] UnknownEventKind),

    #[error("Payload has an empty EventId")]
    MissingEventId,
}

/// Wire shape of a change notification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamDataModel {
    #[serde(default)]
    pub keys: Option<Map<String, Value>>,
    #[serde(default)]
    pub new_image: Option<Map<String, Value>>,
    #[serde(default)]
    pub old_image: Option<Map<String, Value>>,
    pub event_name: String,
    #[serde(rename = "EventId")]
    pub event_id: String,
    #[serde(default)]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub sequence_number: Option<Value>,
}

fn to_item(map: Map<String, Value>) -> Item {
    map.into_iter()
        .map(|(name, value)| (name, AttributeValue::from_json(value)))
        .collect()
}

impl StreamDataModel {
    pub fn from_slice(payload: &[u8]) -> Result<Self, MessageDecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Convert into a change record attributed to `shard_id`.
    ///
    /// The event id doubles as the record's sequence number.
    pub fn into_change_record(self, shard_id: &str) -> Result<ChangeRecord, MessageDecodeError> {
        if self.event_id.is_empty() {
            return Err(MessageDecodeError::MissingEventId);
        }
        let event_kind: EventKind = self.event_name.parse()?;

        Ok(ChangeRecord {
            shard_id: shard_id.to_string(),
            event_kind,
            keys: self.keys.map(to_item).unwrap_or_default(),
            new_image: self.new_image.map(to_item),
            old_image: self.old_image.map(to_item),
            sequence_number: self.event_id,
        })
    }
}

/// Decode a raw payload into a change record.
pub fn decode(payload: &[u8], shard_id: &str) -> Result<ChangeRecord, MessageDecodeError> {
    StreamDataModel::from_slice(payload)?.into_change_record(shard_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_insert() {
        let payload = json!({
            "Keys": {"id": "1"},
            "NewImage": {"id": "1", "count": 2, "tags": ["a"], "active": true},
            "OldImage": null,
            "EventName": "INSERT",
            "EventId": "evt-1",
            "Table": "users",
            "Timestamp": "2024-01-01T00:00:00Z",
            "SequenceNumber": 7
        });

        let record = decode(payload.to_string().as_bytes(), "sub-1").unwrap();

        assert_eq!(record.shard_id, "sub-1");
        assert_eq!(record.sequence_number, "evt-1");
        assert_eq!(record.event_kind, EventKind::Insert);
        assert_eq!(record.keys["id"], AttributeValue::S("1".to_string()));
        let image = record.new_image.unwrap();
        assert_eq!(image["count"], AttributeValue::N("2".to_string()));
        assert_eq!(image["active"], AttributeValue::Bool(true));
        assert_eq!(
            image["tags"],
            AttributeValue::L(vec![AttributeValue::S("a".to_string())])
        );
        assert!(record.old_image.is_none());
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode(b"not json", "sub-1"),
            Err(MessageDecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let payload = json!({"EventName": "UPSERT", "EventId": "e"});
        assert!(matches!(
            decode(payload.to_string().as_bytes(), "sub-1"),
            Err(MessageDecodeError::EventKind(_))
        ));
    }

    #[test]
    fn test_decode_rejects_empty_event_id() {
        let payload = json!({"EventName": "REMOVE", "EventId": ""});
        assert!(matches!(
            decode(payload.to_string().as_bytes(), "sub-1"),
            Err(MessageDecodeError::MissingEventId)
        ));
    }
}
