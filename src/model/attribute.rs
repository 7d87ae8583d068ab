//! DynamoDB attribute values.
//!
//! Serializes in DynamoDB JSON (`{"S": "x"}`, `{"N": "1"}`, binary as base64),
//! which is the shape the adapter's write API and the Streams API both use.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An item or key: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// A single DynamoDB attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as strings to keep arbitrary precision.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B", with = "base64_bytes")]
    B(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(Item),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS", with = "base64_byte_set")]
    Bs(Vec<Vec<u8>>),
}

impl AttributeValue {
    /// Convert a plain JSON value into an attribute value.
    ///
    /// Strings map to `S`, numbers to `N`, booleans to `BOOL`, null to
    /// `NULL`, arrays to `L` and objects to `M`.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => AttributeValue::Null(true),
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s),
            Value::Array(values) => {
                AttributeValue::L(values.into_iter().map(AttributeValue::from_json).collect())
            }
            Value::Object(map) => AttributeValue::M(
                map.into_iter()
                    .map(|(k, v)| (k, AttributeValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Short type tag, as DynamoDB names it.
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::Bs(_) => "BS",
        }
    }
}

/// Convert a JSON object into an item. Non-object values yield `None`.
pub fn item_from_json(value: serde_json::Value) -> Option<Item> {
    match AttributeValue::from_json(value) {
        AttributeValue::M(item) => Some(item),
        _ => None,
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_byte_set {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(set: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(set.len()))?;
        for bytes in set {
            seq.serialize_element(&STANDARD.encode(bytes))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dynamo_json_shape() {
        let value = AttributeValue::S("x".to_string());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"S": "x"}));

        let value = AttributeValue::Bool(true);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"BOOL": true}));
    }

    #[test]
    fn test_binary_is_base64() {
        let value = AttributeValue::B(b"hello".to_vec());
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"B": "aGVsbG8="})
        );

        let parsed: AttributeValue = serde_json::from_value(json!({"BS": ["aGVsbG8="]})).unwrap();
        assert_eq!(parsed, AttributeValue::Bs(vec![b"hello".to_vec()]));
    }

    #[test]
    fn test_nested_map_deserializes() {
        let parsed: Item = serde_json::from_value(json!({
            "id": {"S": "1"},
            "tags": {"SS": ["a", "b"]},
            "meta": {"M": {"count": {"N": "3"}}}
        }))
        .unwrap();

        assert_eq!(parsed["id"], AttributeValue::S("1".to_string()));
        assert_eq!(
            parsed["tags"],
            AttributeValue::Ss(vec!["a".to_string(), "b".to_string()])
        );
        match &parsed["meta"] {
            AttributeValue::M(meta) => assert_eq!(meta["count"], AttributeValue::N("3".to_string())),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_from_plain_json() {
        let item = item_from_json(json!({
            "id": "1",
            "price": 9.5,
            "active": false,
            "gone": null,
            "list": [1, "two"],
        }))
        .unwrap();

        assert_eq!(item["id"], AttributeValue::S("1".to_string()));
        assert_eq!(item["price"], AttributeValue::N("9.5".to_string()));
        assert_eq!(item["active"], AttributeValue::Bool(false));
        assert_eq!(item["gone"], AttributeValue::Null(true));
        assert_eq!(
            item["list"],
            AttributeValue::L(vec![
                AttributeValue::N("1".to_string()),
                AttributeValue::S("two".to_string())
            ])
        );
    }

    #[test]
    fn test_item_from_non_object_is_none() {
        assert!(item_from_json(json!("scalar")).is_none());
        assert!(item_from_json(json!([1, 2])).is_none());
    }

    #[test]
    fn test_type_tag() {
        assert_eq!(AttributeValue::Ns(vec![]).type_tag(), "NS");
        assert_eq!(AttributeValue::Null(true).type_tag(), "NULL");
    }
}
