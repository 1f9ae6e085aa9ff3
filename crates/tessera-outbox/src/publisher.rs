//! Message broker collaborator used by the relay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Failure to hand a message to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    /// The broker refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
    /// No answer within the allowed time.
    #[error("publish timed out after {0:?}")]
    TimedOut(Duration),
}

/// Publishes serialized integration events to a broker topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes one message.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if the broker does not accept the message.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;

    /// Publishes several messages to one topic, in order.
    ///
    /// # Errors
    ///
    /// Returns the first `PublishError`; later messages are not sent.
    async fn publish_batch(&self, topic: &str, payloads: &[String]) -> Result<(), PublishError> {
        for payload in payloads {
            self.publish(topic, payload).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<P: MessagePublisher + ?Sized> MessagePublisher for Arc<P> {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        (**self).publish(topic, payload).await
    }

    async fn publish_batch(&self, topic: &str, payloads: &[String]) -> Result<(), PublishError> {
        (**self).publish_batch(topic, payloads).await
    }
}

/// Publisher that writes each message to the log instead of a broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl MessagePublisher for LoggingPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        info!(topic, payload, "published integration event");
        Ok(())
    }
}
