//! Mock push topic for testing.
//!
//! Messages published to the mock are delivered in order to its single
//! subscription. Acks and nacks are recorded by message id.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};

use super::{FlowControl, PushError, PushMessage, PushTopic, Result, Subscription};

#[derive(Default)]
struct AckLog {
    acked: RwLock<Vec<String>>,
    nacked: RwLock<Vec<String>>,
}

/// A scripted message.
pub struct MockMessage {
    id: String,
    payload: Vec<u8>,
    log: Arc<AckLog>,
}

#[async_trait]
impl PushMessage for MockMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> Result<()> {
        self.log.acked.write().await.push(self.id.clone());
        Ok(())
    }

    async fn nack(&self) -> Result<()> {
        self.log.nacked.write().await.push(self.id.clone());
        Ok(())
    }
}

struct MockSubscription {
    receiver: mpsc::UnboundedReceiver<MockMessage>,
}

#[async_trait]
impl Subscription for MockSubscription {
    async fn next(&mut self) -> Result<Option<Box<dyn PushMessage>>> {
        Ok(self
            .receiver
            .recv()
            .await
            .map(|m| Box::new(m) as Box<dyn PushMessage>))
    }
}

/// Mock topic delivering published payloads to one subscriber.
pub struct MockPushTopic {
    sender: RwLock<Option<mpsc::UnboundedSender<MockMessage>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<MockMessage>>>,
    log: Arc<AckLog>,
    published: RwLock<usize>,
    subscriptions: RwLock<Vec<(String, FlowControl)>>,
    fail_on_subscribe: RwLock<bool>,
}

impl Default for MockPushTopic {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
            log: Arc::new(AckLog::default()),
            published: RwLock::new(0),
            subscriptions: RwLock::new(Vec::new()),
            fail_on_subscribe: RwLock::new(false),
        }
    }
}

impl MockPushTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message; returns its id (`msg-0`, `msg-1`, ...).
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> String {
        let id = {
            let mut published = self.published.write().await;
            let id = format!("msg-{}", *published);
            *published += 1;
            id
        };

        if let Some(sender) = self.sender.read().await.as_ref() {
            let _ = sender.send(MockMessage {
                id: id.clone(),
                payload: payload.into(),
                log: self.log.clone(),
            });
        }
        id
    }

    /// Close the topic: the subscription ends once drained.
    pub async fn close(&self) {
        self.sender.write().await.take();
    }

    pub async fn set_fail_on_subscribe(&self, fail: bool) {
        *self.fail_on_subscribe.write().await = fail;
    }

    pub async fn acked(&self) -> Vec<String> {
        self.log.acked.read().await.clone()
    }

    pub async fn nacked(&self) -> Vec<String> {
        self.log.nacked.read().await.clone()
    }

    /// Subscription ids and flow control of every `subscribe` call.
    pub async fn subscriptions(&self) -> Vec<(String, FlowControl)> {
        self.subscriptions.read().await.clone()
    }
}

#[async_trait]
impl PushTopic for MockPushTopic {
    async fn subscribe(
        &self,
        subscription_id: &str,
        flow_control: FlowControl,
    ) -> Result<Box<dyn Subscription>> {
        self.subscriptions
            .write()
            .await
            .push((subscription_id.to_string(), flow_control));

        if *self.fail_on_subscribe.read().await {
            return Err(PushError::Subscribe {
                subscription: subscription_id.to_string(),
                reason: "Mock subscribe failure".to_string(),
            });
        }

        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| PushError::Subscribe {
                subscription: subscription_id.to_string(),
                reason: "Mock topic already has a subscriber".to_string(),
            })?;

        Ok(Box::new(MockSubscription { receiver }))
    }
}
