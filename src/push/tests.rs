use std::time::Duration;

use serde_json::json;

use super::*;
use crate::target::{MockTargetAdapter, TargetCall};
use crate::test_utils::image;

fn consumer(topic: Arc<MockPushTopic>, adapter: Arc<MockTargetAdapter>) -> PushConsumer {
    PushConsumer::new(
        "users-push",
        "sub-1",
        topic,
        RecordDispatcher::new("users", adapter),
    )
}

fn insert_payload(id: &str) -> Vec<u8> {
    json!({
        "Keys": {"id": id},
        "NewImage": {"id": id, "name": "x"},
        "EventName": "INSERT",
        "EventId": format!("evt-{id}"),
        "Table": "users"
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_applies_and_acks_messages() {
    let topic = Arc::new(MockPushTopic::new());
    let adapter = Arc::new(MockTargetAdapter::new());
    topic.publish(insert_payload("1")).await;
    topic.close().await;

    let cancel = CancellationToken::new();
    consumer(topic.clone(), adapter.clone())
        .start(cancel.clone())
        .await
        .unwrap();

    assert_eq!(topic.acked().await, vec!["msg-0".to_string()]);
    assert!(topic.nacked().await.is_empty());
    assert!(!cancel.is_cancelled());
    assert_eq!(
        adapter.calls().await,
        vec![TargetCall::Put {
            table_name: "users".to_string(),
            item: image("1", "x"),
        }]
    );
}

#[tokio::test]
async fn test_subscribes_with_single_outstanding_message() {
    let topic = Arc::new(MockPushTopic::new());
    topic.close().await;

    consumer(topic.clone(), Arc::new(MockTargetAdapter::new()))
        .start(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        topic.subscriptions().await,
        vec![(
            "sub-1".to_string(),
            FlowControl {
                max_outstanding_messages: 1
            }
        )]
    );
}

#[tokio::test]
async fn test_undecodable_message_nacks_once_and_cancels() {
    let topic = Arc::new(MockPushTopic::new());
    let adapter = Arc::new(MockTargetAdapter::new());
    topic.publish("not json").await;
    topic.publish(insert_payload("2")).await;

    let cancel = CancellationToken::new();
    let err = consumer(topic.clone(), adapter.clone())
        .start(cancel.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, PushError::Decode { ref message_id, .. } if message_id == "msg-0"));
    assert_eq!(topic.nacked().await, vec!["msg-0".to_string()]);
    assert!(topic.acked().await.is_empty());
    assert!(cancel.is_cancelled());
    assert!(adapter.calls().await.is_empty());
}

#[tokio::test]
async fn test_dispatch_failure_nacks_and_cancels() {
    let topic = Arc::new(MockPushTopic::new());
    let adapter = Arc::new(MockTargetAdapter::new());
    adapter.set_fail_on_put(true).await;
    topic.publish(insert_payload("1")).await;

    let cancel = CancellationToken::new();
    let err = consumer(topic.clone(), adapter)
        .start(cancel.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, PushError::Dispatch(_)));
    assert_eq!(topic.nacked().await.len(), 1);
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn test_remove_message_is_acked_without_delete() {
    let topic = Arc::new(MockPushTopic::new());
    let adapter = Arc::new(MockTargetAdapter::new());
    topic
        .publish(
            json!({
                "Keys": {"id": "1"},
                "OldImage": {"id": "1", "name": "x"},
                "EventName": "REMOVE",
                "EventId": "evt-1"
            })
            .to_string(),
        )
        .await;
    topic.close().await;

    consumer(topic.clone(), adapter.clone())
        .start(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(topic.acked().await.len(), 1);
    assert_eq!(adapter.delete_count().await, 0);
}

#[tokio::test]
async fn test_cancel_while_waiting_ends_cleanly() {
    let topic = Arc::new(MockPushTopic::new());
    let cancel = CancellationToken::new();
    let consumer = consumer(topic, Arc::new(MockTargetAdapter::new()));

    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { consumer.start(cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("consumer did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_subscribe_failure_cancels() {
    let topic = Arc::new(MockPushTopic::new());
    topic.set_fail_on_subscribe(true).await;
    let cancel = CancellationToken::new();

    let err = consumer(topic, Arc::new(MockTargetAdapter::new()))
        .start(cancel.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, PushError::Subscribe { .. }));
    assert!(cancel.is_cancelled());
}
