//! Record builders shared by unit tests.

use crate::model::{AttributeValue, EventKind, Item, StreamRecord};

/// Item with a single string `id` attribute.
pub fn key(id: &str) -> Item {
    Item::from([("id".to_string(), AttributeValue::S(id.to_string()))])
}

/// Item with `id` and `name` string attributes.
pub fn image(id: &str, name: &str) -> Item {
    let mut item = key(id);
    item.insert("name".to_string(), AttributeValue::S(name.to_string()));
    item
}

pub fn insert_record(sequence_number: &str, id: &str) -> StreamRecord {
    StreamRecord {
        event_kind: EventKind::Insert,
        keys: key(id),
        new_image: Some(image(id, "x")),
        old_image: None,
        sequence_number: sequence_number.to_string(),
    }
}

pub fn modify_record(sequence_number: &str, id: &str, name: &str) -> StreamRecord {
    StreamRecord {
        event_kind: EventKind::Modify,
        keys: key(id),
        new_image: Some(image(id, name)),
        old_image: Some(image(id, "x")),
        sequence_number: sequence_number.to_string(),
    }
}

pub fn remove_record(sequence_number: &str, id: &str) -> StreamRecord {
    StreamRecord {
        event_kind: EventKind::Remove,
        keys: key(id),
        new_image: None,
        old_image: Some(image(id, "x")),
        sequence_number: sequence_number.to_string(),
    }
}
