//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use cdc_replicator::config::Config;
use cdc_replicator::model::{AttributeValue, EventKind, Item, StreamRecord};
use cdc_replicator::target::MockTargetAdapter;

pub fn item(id: &str) -> Item {
    Item::from([("id".to_string(), AttributeValue::S(id.to_string()))])
}

pub fn insert(sequence_number: &str, id: &str) -> StreamRecord {
    StreamRecord {
        event_kind: EventKind::Insert,
        keys: item(id),
        new_image: Some(item(id)),
        old_image: None,
        sequence_number: sequence_number.to_string(),
    }
}

pub fn remove(sequence_number: &str, id: &str) -> StreamRecord {
    StreamRecord {
        event_kind: EventKind::Remove,
        keys: item(id),
        new_image: None,
        old_image: Some(item(id)),
        sequence_number: sequence_number.to_string(),
    }
}

/// Config with millisecond engine timings and the given YAML stream list.
pub fn fast_config(streams: &str) -> Config {
    let mut config = Config::default();
    config.engine.refresh_initial_delay_ms = 0;
    config.engine.refresh_interval_ms = 10;
    config.engine.yield_delay_ms = 1;
    config.engine.idle_delay_ms = 1;
    config.streams = serde_yaml::from_str(streams).expect("invalid stream YAML");
    config
}

/// Resolve once the adapter has received `count` puts.
pub async fn puts_reached(adapter: std::sync::Arc<MockTargetAdapter>, count: usize) {
    while adapter.put_count().await < count {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(5);
