//! Mock stream source for testing.
//!
//! Holds shards and their records in memory. Iterator tokens are
//! `{shard_id}#{offset}`; an open shard keeps returning empty pages once
//! drained, a sealed shard ends with no next iterator.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IteratorPosition, RecordsPage, Result, SourceError, StreamSource, TopologyPage};
use crate::model::{Shard, StreamRecord};

/// Default number of records per page.
const DEFAULT_PAGE_SIZE: usize = 100;

/// A scripted shard.
#[derive(Debug, Clone)]
pub struct MockShard {
    pub shard: Shard,
    pub records: Vec<StreamRecord>,
    pub page_size: usize,
    pub sealed: bool,
}

impl MockShard {
    /// A shard that has been closed: reading past its last record ends it.
    pub fn sealed(shard: Shard, records: Vec<StreamRecord>) -> Self {
        Self {
            shard,
            records,
            page_size: DEFAULT_PAGE_SIZE,
            sealed: true,
        }
    }

    /// A shard still accepting writes: reading past its last record yields empty pages.
    pub fn open(shard: Shard, records: Vec<StreamRecord>) -> Self {
        Self {
            shard,
            records,
            page_size: DEFAULT_PAGE_SIZE,
            sealed: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

#[derive(Default)]
struct MockState {
    shards: Vec<MockShard>,
    topology_page_size: Option<usize>,
    fail_on_describe: bool,
    fail_on_records: bool,
    describe_requests: Vec<Option<String>>,
    iterator_requests: Vec<(String, IteratorPosition)>,
    records_requests: usize,
}

/// Mock stream source that serves scripted shards from memory.
#[derive(Default)]
pub struct MockStreamSource {
    state: RwLock<MockState>,
}

impl MockStreamSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source with the given shards, in topology order.
    pub fn with_shards(shards: Vec<MockShard>) -> Self {
        Self {
            state: RwLock::new(MockState {
                shards,
                ..Default::default()
            }),
        }
    }

    /// Limit the number of shards per topology page.
    pub async fn set_topology_page_size(&self, page_size: usize) {
        self.state.write().await.topology_page_size = Some(page_size.max(1));
    }

    pub async fn add_shard(&self, shard: MockShard) {
        self.state.write().await.shards.push(shard);
    }

    pub async fn push_records(&self, shard_id: &str, records: Vec<StreamRecord>) {
        let mut state = self.state.write().await;
        if let Some(shard) = state.shards.iter_mut().find(|s| s.shard.id == shard_id) {
            shard.records.extend(records);
        }
    }

    pub async fn seal(&self, shard_id: &str) {
        let mut state = self.state.write().await;
        if let Some(shard) = state.shards.iter_mut().find(|s| s.shard.id == shard_id) {
            shard.sealed = true;
        }
    }

    pub async fn set_fail_on_describe(&self, fail: bool) {
        self.state.write().await.fail_on_describe = fail;
    }

    pub async fn set_fail_on_records(&self, fail: bool) {
        self.state.write().await.fail_on_records = fail;
    }

    /// Cursors passed to `describe_topology`, in call order.
    pub async fn describe_requests(&self) -> Vec<Option<String>> {
        self.state.read().await.describe_requests.clone()
    }

    /// Shard ids and positions passed to `get_iterator`, in call order.
    pub async fn iterator_requests(&self) -> Vec<(String, IteratorPosition)> {
        self.state.read().await.iterator_requests.clone()
    }

    pub async fn records_requests(&self) -> usize {
        self.state.read().await.records_requests
    }
}

fn iterator_token(shard_id: &str, offset: usize) -> String {
    format!("{}#{}", shard_id, offset)
}

fn parse_token(token: &str) -> Result<(&str, usize)> {
    let (shard_id, offset) = token
        .rsplit_once('#')
        .ok_or_else(|| SourceError::ExpiredIterator(token.to_string()))?;
    let offset = offset
        .parse()
        .map_err(|_| SourceError::ExpiredIterator(token.to_string()))?;
    Ok((shard_id, offset))
}

/// Order sequence numbers numerically when both are digit strings.
fn compare_sequence(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

#[async_trait]
impl StreamSource for MockStreamSource {
    async fn describe_topology(
        &self,
        exclusive_start_shard_id: Option<&str>,
    ) -> Result<TopologyPage> {
        let mut state = self.state.write().await;
        state
            .describe_requests
            .push(exclusive_start_shard_id.map(str::to_string));

        if state.fail_on_describe {
            return Err(SourceError::Request("Mock describe failure".to_string()));
        }

        let start = match exclusive_start_shard_id {
            Some(id) => state
                .shards
                .iter()
                .position(|s| s.shard.id == id)
                .map(|i| i + 1)
                .ok_or_else(|| SourceError::Malformed(format!("Unknown start shard {}", id)))?,
            None => 0,
        };

        let page_size = state.topology_page_size.unwrap_or(usize::MAX);
        let end = start.saturating_add(page_size).min(state.shards.len());
        let shards: Vec<Shard> = state.shards[start..end]
            .iter()
            .map(|s| s.shard.clone())
            .collect();

        let last_evaluated_shard_id = if end < state.shards.len() {
            shards.last().map(|s| s.id.clone())
        } else {
            None
        };

        Ok(TopologyPage {
            shards,
            last_evaluated_shard_id,
        })
    }

    async fn get_iterator(&self, shard_id: &str, position: IteratorPosition) -> Result<String> {
        let mut state = self.state.write().await;
        state
            .iterator_requests
            .push((shard_id.to_string(), position.clone()));

        let shard = state
            .shards
            .iter()
            .find(|s| s.shard.id == shard_id)
            .ok_or_else(|| SourceError::Request(format!("Shard {} not found", shard_id)))?;

        let offset = match &position {
            IteratorPosition::TrimHorizon => 0,
            IteratorPosition::AfterSequenceNumber(sequence) => shard
                .records
                .iter()
                .position(|r| compare_sequence(&r.sequence_number, sequence) == Ordering::Greater)
                .unwrap_or(shard.records.len()),
        };

        Ok(iterator_token(shard_id, offset))
    }

    async fn get_records(&self, iterator: &str) -> Result<RecordsPage> {
        let mut state = self.state.write().await;
        state.records_requests += 1;

        if state.fail_on_records {
            return Err(SourceError::Request("Mock get_records failure".to_string()));
        }

        let (shard_id, offset) = parse_token(iterator)?;
        let shard = state
            .shards
            .iter()
            .find(|s| s.shard.id == shard_id)
            .ok_or_else(|| SourceError::ExpiredIterator(iterator.to_string()))?;

        let start = offset.min(shard.records.len());
        let end = start.saturating_add(shard.page_size).min(shard.records.len());
        let records = shard.records[start..end].to_vec();

        let next_iterator = if end >= shard.records.len() && shard.sealed {
            None
        } else {
            Some(iterator_token(shard_id, end))
        };

        Ok(RecordsPage {
            records,
            next_iterator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::insert_record;

    #[test]
    fn test_compare_sequence_numeric() {
        assert_eq!(compare_sequence("100", "99"), Ordering::Greater);
        assert_eq!(compare_sequence("0100", "100"), Ordering::Equal);
        assert_eq!(compare_sequence("abc", "abd"), Ordering::Less);
    }

    #[tokio::test]
    async fn test_topology_paging() {
        let source = MockStreamSource::with_shards(vec![
            MockShard::sealed(Shard::root("a"), vec![]),
            MockShard::sealed(Shard::child("b", "a"), vec![]),
            MockShard::sealed(Shard::child("c", "a"), vec![]),
        ]);
        source.set_topology_page_size(2).await;

        let first = source.describe_topology(None).await.unwrap();
        assert_eq!(first.shards.len(), 2);
        assert_eq!(first.last_evaluated_shard_id.as_deref(), Some("b"));

        let second = source.describe_topology(Some("b")).await.unwrap();
        assert_eq!(second.shards, vec![Shard::child("c", "a")]);
        assert!(second.last_evaluated_shard_id.is_none());
    }

    #[tokio::test]
    async fn test_iterator_after_sequence() {
        let source = MockStreamSource::with_shards(vec![MockShard::sealed(
            Shard::root("a"),
            vec![insert_record("100", "1"), insert_record("200", "2")],
        )]);

        let iterator = source
            .get_iterator("a", IteratorPosition::AfterSequenceNumber("100".to_string()))
            .await
            .unwrap();
        let page = source.get_records(&iterator).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].sequence_number, "200");
        assert!(page.next_iterator.is_none());
    }

    #[tokio::test]
    async fn test_open_shard_returns_empty_pages() {
        let source =
            MockStreamSource::with_shards(vec![MockShard::open(Shard::root("a"), vec![])]);

        let iterator = source
            .get_iterator("a", IteratorPosition::TrimHorizon)
            .await
            .unwrap();
        let page = source.get_records(&iterator).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.next_iterator.as_deref(), Some("a#0"));
    }

    #[tokio::test]
    async fn test_bad_token_is_expired_iterator() {
        let source = MockStreamSource::new();
        let err = source.get_records("garbage").await.unwrap_err();
        assert!(matches!(err, SourceError::ExpiredIterator(_)));
    }
}
