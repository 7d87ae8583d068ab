use super::*;
use crate::model::ChangeRecord;
use crate::target::{MockTargetAdapter, TargetCall};
use crate::test_utils::{image, insert_record, modify_record, remove_record};

fn dispatcher() -> (RecordDispatcher, Arc<MockTargetAdapter>) {
    let adapter = Arc::new(MockTargetAdapter::new());
    (RecordDispatcher::new("table", adapter.clone()), adapter)
}

#[tokio::test]
async fn test_insert_puts_new_image() {
    let (dispatcher, adapter) = dispatcher();
    let record = ChangeRecord::from_stream("shard-a", insert_record("1", "1"));

    dispatcher.dispatch(&record).await.unwrap();

    assert_eq!(
        adapter.calls().await,
        vec![TargetCall::Put {
            table_name: "table".to_string(),
            item: image("1", "x"),
        }]
    );
}

#[tokio::test]
async fn test_modify_puts_full_new_image() {
    let (dispatcher, adapter) = dispatcher();
    let record = ChangeRecord::from_stream("shard-a", modify_record("2", "1", "y"));

    dispatcher.dispatch(&record).await.unwrap();

    assert_eq!(adapter.put_count().await, 1);
    assert_eq!(adapter.update_count().await, 0);
    assert_eq!(
        adapter.calls().await[0],
        TargetCall::Put {
            table_name: "table".to_string(),
            item: image("1", "y"),
        }
    );
}

#[tokio::test]
async fn test_remove_never_deletes() {
    let (dispatcher, adapter) = dispatcher();
    let record = ChangeRecord::from_stream("shard-a", remove_record("3", "1"));

    dispatcher.dispatch(&record).await.unwrap();

    assert_eq!(adapter.delete_count().await, 0);
    assert!(adapter.calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_new_image_is_error() {
    let (dispatcher, adapter) = dispatcher();
    let mut record = ChangeRecord::from_stream("shard-a", insert_record("4", "1"));
    record.new_image = None;

    let err = dispatcher.dispatch(&record).await.unwrap_err();

    assert!(matches!(err, DispatchError::MissingImage { .. }));
    assert!(adapter.calls().await.is_empty());
}

#[tokio::test]
async fn test_adapter_failure_carries_context() {
    let (dispatcher, adapter) = dispatcher();
    adapter.set_fail_on_put(true).await;
    let record = ChangeRecord::from_stream("shard-a", insert_record("5", "1"));

    let err = dispatcher.dispatch(&record).await.unwrap_err();

    match err {
        DispatchError::Apply {
            table,
            shard_id,
            sequence_number,
            ..
        } => {
            assert_eq!(table, "table");
            assert_eq!(shard_id, "shard-a");
            assert_eq!(sequence_number, "5");
        }
        other => panic!("unexpected error: {other}"),
    }
}
