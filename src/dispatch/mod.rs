//! Record dispatch.
//!
//! Maps each change record to the write it implies on the target store.
//! Inserts and modifications are full-image puts, so replaying a record is
//! harmless. Removals are logged and never applied.

use std::sync::Arc;

use tracing::{debug, info};

use crate::model::{ChangeRecord, EventKind};
use crate::target::{TargetAdapter, TargetError};

/// Errors from applying a change record.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to apply {sequence_number} from {shard_id} to {table}: {source}")]
    Apply {
        table: String,
        shard_id: String,
        sequence_number: String,
        #[source]
        source: TargetError,
    },

    #[error("{event_kind} record {sequence_number} from {shard_id} has no new image")]
    MissingImage {
        event_kind: EventKind,
        shard_id: String,
        sequence_number: String,
    },
}

/// Applies change records to one table through a target adapter.
#[derive(Clone)]
pub struct RecordDispatcher {
    table_name: String,
    adapter: Arc<dyn TargetAdapter>,
}

impl RecordDispatcher {
    pub fn new(table_name: impl Into<String>, adapter: Arc<dyn TargetAdapter>) -> Self {
        Self {
            table_name: table_name.into(),
            adapter,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Apply one record. Errors are not retried here.
    pub async fn dispatch(&self, record: &ChangeRecord) -> Result<(), DispatchError> {
        match record.event_kind {
            EventKind::Insert | EventKind::Modify => self.apply_image(record).await,
            EventKind::Remove => {
                info!(
                    table = %self.table_name,
                    shard_id = %record.shard_id,
                    sequence_number = %record.sequence_number,
                    keys = ?record.keys,
                    old_image = ?record.old_image,
                    "Remove event received, not applied"
                );
                Ok(())
            }
        }
    }

    async fn apply_image(&self, record: &ChangeRecord) -> Result<(), DispatchError> {
        let image = record
            .new_image
            .clone()
            .ok_or_else(|| DispatchError::MissingImage {
                event_kind: record.event_kind,
                shard_id: record.shard_id.clone(),
                sequence_number: record.sequence_number.clone(),
            })?;

        self.adapter
            .put(&self.table_name, image)
            .await
            .map_err(|source| DispatchError::Apply {
                table: self.table_name.clone(),
                shard_id: record.shard_id.clone(),
                sequence_number: record.sequence_number.clone(),
                source,
            })?;

        debug!(
            table = %self.table_name,
            shard_id = %record.shard_id,
            sequence_number = %record.sequence_number,
            event = %record.event_kind,
            "Applied change record"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
