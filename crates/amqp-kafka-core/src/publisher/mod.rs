//! Outbound publishing to Kafka.
//!
//! The forwarding loop only sees the [`Publisher`] trait: publish one
//! message, get back where it landed or an opaque error. [`KafkaPublisher`]
//! is the production implementation on top of rdkafka.

mod kafka;

use async_trait::async_trait;

use crate::error::PublishResult;
use crate::headers::HeaderSet;

pub use kafka::{client_config, KafkaPublisher};

/// Where a published message was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub partition: i32,
    pub offset: i64,
}

/// A sink that publishes messages to one configured topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// The topic every message is published to.
    fn topic(&self) -> &str;

    /// Publish one message and wait for the broker acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be delivered, for whatever
    /// reason.
    async fn publish(&self, headers: &HeaderSet, payload: &[u8]) -> PublishResult<PublishReceipt>;

    /// Flush outstanding messages and release the producer.
    async fn shutdown(&self);
}
