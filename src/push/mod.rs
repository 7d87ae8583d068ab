//! Push-direction replication.
//!
//! A `PushConsumer` receives change notifications from a topic subscription
//! one at a time, applies each through a `RecordDispatcher` and acknowledges
//! it. The first message that cannot be decoded or applied is nacked for
//! redelivery and the consumer cancels its stream.
//!
//! Implementations of `PushTopic`:
//! - `PubSubTopic`: Google Pub/Sub (feature `pubsub`)
//! - `MockPushTopic`: scripted messages for testing

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::dispatch::{DispatchError, RecordDispatcher};

pub mod message;
pub mod mock;
#[cfg(feature = "pubsub")]
pub mod pubsub;

pub use message::{decode, MessageDecodeError, StreamDataModel};
pub use mock::{MockMessage, MockPushTopic};
#[cfg(feature = "pubsub")]
pub use pubsub::PubSubTopic;

/// Result type for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

/// Errors that end a push stream.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Failed to subscribe to {subscription}: {reason}")]
    Subscribe {
        subscription: String,
        reason: String,
    },

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Failed to decode message {message_id}: {source}")]
    Decode {
        message_id: String,
        #[source]
        source: MessageDecodeError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Failed to acknowledge message {message_id}: {reason}")]
    Ack { message_id: String, reason: String },
}

/// Delivery limits requested from the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    pub max_outstanding_messages: usize,
}

impl FlowControl {
    /// One message in flight at a time.
    pub fn synchronous() -> Self {
        Self {
            max_outstanding_messages: 1,
        }
    }
}

/// A message topic offering subscriptions.
#[async_trait]
pub trait PushTopic: Send + Sync {
    async fn subscribe(
        &self,
        subscription_id: &str,
        flow_control: FlowControl,
    ) -> Result<Box<dyn Subscription>>;
}

/// An open subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message; `None` once the subscription is closed.
    async fn next(&mut self) -> Result<Option<Box<dyn PushMessage>>>;
}

/// A delivered message awaiting acknowledgement.
#[async_trait]
pub trait PushMessage: Send + Sync {
    fn id(&self) -> &str;

    fn payload(&self) -> &[u8];

    async fn ack(&self) -> Result<()>;

    /// Ask for redelivery.
    async fn nack(&self) -> Result<()>;
}

/// Applies messages of one subscription to a table.
pub struct PushConsumer {
    stream_id: String,
    subscription_id: String,
    topic: Arc<dyn PushTopic>,
    dispatcher: RecordDispatcher,
}

impl PushConsumer {
    pub fn new(
        stream_id: impl Into<String>,
        subscription_id: impl Into<String>,
        topic: Arc<dyn PushTopic>,
        dispatcher: RecordDispatcher,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            subscription_id: subscription_id.into(),
            topic,
            dispatcher,
        }
    }

    /// Consume until cancelled, the subscription closes, or a message fails.
    ///
    /// On failure the message is nacked, `cancel` is cancelled and the error
    /// is returned.
    pub async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let mut subscription = match self
            .topic
            .subscribe(&self.subscription_id, FlowControl::synchronous())
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };

        info!(
            stream = %self.stream_id,
            subscription = %self.subscription_id,
            table = %self.dispatcher.table_name(),
            "Starting push consumer"
        );

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(subscription = %self.subscription_id, "Push consumer cancelled");
                    return Ok(());
                }
                next = subscription.next() => next,
            };

            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!(subscription = %self.subscription_id, "Subscription closed");
                    return Ok(());
                }
                Err(e) => {
                    error!(subscription = %self.subscription_id, error = %e, "Receive failed");
                    cancel.cancel();
                    return Err(e);
                }
            };

            if let Err(e) = self.handle(message.as_ref()).await {
                error!(
                    subscription = %self.subscription_id,
                    message_id = %message.id(),
                    error = %e,
                    "Failed to apply message, stopping consumer"
                );
                if let Err(nack_err) = message.nack().await {
                    warn!(message_id = %message.id(), error = %nack_err, "Nack failed");
                }
                cancel.cancel();
                return Err(e);
            }

            if let Err(e) = message.ack().await {
                error!(message_id = %message.id(), error = %e, "Ack failed, stopping consumer");
                cancel.cancel();
                return Err(e);
            }
        }
    }

    #[instrument(skip_all, fields(subscription = %self.subscription_id, message_id = %message.id()))]
    async fn handle(&self, message: &dyn PushMessage) -> Result<()> {
        let record =
            decode(message.payload(), &self.subscription_id).map_err(|source| PushError::Decode {
                message_id: message.id().to_string(),
                source,
            })?;

        self.dispatcher.dispatch(&record).await?;

        debug!(event = %record.event_kind, "Message applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
