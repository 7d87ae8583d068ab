//! Google Pub/Sub push topic.
//!
//! # Authentication
//!
//! Uses ADC (Application Default Credentials):
//! - Set `GOOGLE_APPLICATION_CREDENTIALS` to a service account JSON path
//! - For local testing: set `PUBSUB_EMULATOR_HOST` to the emulator address

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use gcloud_pubsub::client::{Client, ClientConfig};
use gcloud_pubsub::subscriber::ReceivedMessage;
use gcloud_pubsub::subscription::Subscription as PubSubSubscription;
use tracing::{debug, info, warn};

use super::{FlowControl, PushError, PushMessage, PushTopic, Result, Subscription};

/// Pull attempts before a receive error ends the consumer.
const MAX_PULL_RETRIES: usize = 5;

/// Pub/Sub client for one GCP project.
pub struct PubSubTopic {
    client: Client,
    project_id: String,
}

impl PubSubTopic {
    /// Connect using Application Default Credentials.
    pub async fn new(project_id: impl Into<String>) -> Result<Self> {
        let project_id = project_id.into();
        let config = ClientConfig {
            project_id: Some(project_id.clone()),
            ..Default::default()
        }
        .with_auth()
        .await
        .map_err(|e| PushError::Subscribe {
            subscription: project_id.clone(),
            reason: format!("Failed to configure Pub/Sub auth: {}", e),
        })?;

        let client = Client::new(config)
            .await
            .map_err(|e| PushError::Subscribe {
                subscription: project_id.clone(),
                reason: format!("Failed to create Pub/Sub client: {}", e),
            })?;

        info!(project_id = %project_id, "Connected to Google Pub/Sub");

        Ok(Self { client, project_id })
    }
}

#[async_trait]
impl PushTopic for PubSubTopic {
    async fn subscribe(
        &self,
        subscription_id: &str,
        flow_control: FlowControl,
    ) -> Result<Box<dyn Subscription>> {
        let subscription = self.client.subscription(subscription_id);

        let exists = subscription
            .exists(None)
            .await
            .map_err(|e| PushError::Subscribe {
                subscription: subscription_id.to_string(),
                reason: format!("Failed to check subscription: {}", e),
            })?;
        if !exists {
            return Err(PushError::Subscribe {
                subscription: subscription_id.to_string(),
                reason: format!("Subscription not found in project {}", self.project_id),
            });
        }

        info!(
            subscription = %subscription.fully_qualified_name(),
            max_outstanding = flow_control.max_outstanding_messages,
            "Subscribed to Pub/Sub"
        );

        Ok(Box::new(PullSubscription {
            subscription,
            max_messages: flow_control.max_outstanding_messages.max(1) as i32,
            buffered: VecDeque::new(),
        }))
    }
}

struct PullSubscription {
    subscription: PubSubSubscription,
    max_messages: i32,
    buffered: VecDeque<ReceivedMessage>,
}

impl PullSubscription {
    async fn pull(&self) -> Result<Vec<ReceivedMessage>> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(30))
            .with_max_times(MAX_PULL_RETRIES)
            .with_jitter();

        (|| async {
            self.subscription
                .pull(self.max_messages, None)
                .await
                .map_err(|e| PushError::Receive(e.to_string()))
        })
        .retry(backoff)
        .notify(|err: &PushError, delay: Duration| {
            warn!(error = %err, delay = ?delay, "Pub/Sub pull failed, retrying");
        })
        .await
    }
}

#[async_trait]
impl Subscription for PullSubscription {
    async fn next(&mut self) -> Result<Option<Box<dyn PushMessage>>> {
        loop {
            if let Some(message) = self.buffered.pop_front() {
                return Ok(Some(Box::new(PubSubMessage::new(message))));
            }

            let messages = self.pull().await?;
            debug!(count = messages.len(), "Pulled messages");
            self.buffered.extend(messages);
        }
    }
}

struct PubSubMessage {
    id: String,
    inner: ReceivedMessage,
}

impl PubSubMessage {
    fn new(inner: ReceivedMessage) -> Self {
        Self {
            id: inner.message.message_id.clone(),
            inner,
        }
    }
}

#[async_trait]
impl PushMessage for PubSubMessage {
    fn id(&self) -> &str {
        &self.id
    }

    fn payload(&self) -> &[u8] {
        &self.inner.message.data
    }

    async fn ack(&self) -> Result<()> {
        self.inner.ack().await.map_err(|e| PushError::Ack {
            message_id: self.id.clone(),
            reason: e.to_string(),
        })
    }

    async fn nack(&self) -> Result<()> {
        self.inner.nack().await.map_err(|e| PushError::Ack {
            message_id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}
