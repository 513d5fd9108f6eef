//! Inbound message model.
//!
//! A [`Delivery`] is the bridge's own view of one AMQP message: every
//! property flattened to a plain value, with the empty string, zero or
//! `None` standing in for "not set". Keeping it independent of the AMQP
//! client lets the header mapper and forwarding loop be tested without a
//! broker.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lapin::BasicProperties;
use lapin::types::ShortString;

/// AMQP delivery mode, decoded from its raw property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Persistent,
    NonPersistent,
}

impl DeliveryMode {
    /// Decode a raw delivery mode: 1 is persistent, 2 is non-persistent,
    /// anything else is unspecified.
    #[must_use]
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Persistent),
            2 => Some(Self::NonPersistent),
            _ => None,
        }
    }

    /// Header label for this mode.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persistent => "persistent",
            Self::NonPersistent => "non-persistent",
        }
    }
}

/// One inbound message with its metadata and payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delivery {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: String,
    pub app_id: String,
    pub correlation_id: String,
    pub message_id: String,
    pub reply_to: String,
    pub routing_key: String,
    pub exchange: String,
    pub user_id: String,
    /// The AMQP `type` property.
    pub kind: String,
    pub expiration: String,
    pub consumer_tag: String,
    pub priority: u8,
    /// Raw delivery mode property, see [`DeliveryMode::from_raw`].
    pub delivery_mode: u8,
    /// Acknowledgment handle. 0 means unset.
    pub delivery_tag: u64,
    /// Messages remaining in the queue. Only meaningful when greater than 0.
    pub message_count: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Delivery {
    /// Decoded delivery mode, if the raw value is a known one.
    #[must_use]
    pub fn mode(&self) -> Option<DeliveryMode> {
        DeliveryMode::from_raw(self.delivery_mode)
    }

    /// Convert a delivery received by an AMQP consumer.
    ///
    /// The client's delivery does not expose the consumer tag that
    /// `basic.deliver` carries, so the tag the consumer was registered with is
    /// passed in. `basic.deliver` has no message count, so the count stays 0.
    #[must_use]
    pub fn from_amqp(delivery: lapin::message::Delivery, consumer_tag: &str) -> Self {
        let lapin::message::Delivery {
            delivery_tag,
            exchange,
            routing_key,
            properties,
            data,
            ..
        } = delivery;

        let mut converted = Self::from_properties(&properties);
        converted.body = Bytes::from(data);
        converted.delivery_tag = delivery_tag;
        converted.exchange = exchange.as_str().to_string();
        converted.routing_key = routing_key.as_str().to_string();
        converted.consumer_tag = consumer_tag.to_string();
        converted
    }

    fn from_properties(properties: &BasicProperties) -> Self {
        Self {
            content_type: short_string(properties.content_type()),
            content_encoding: short_string(properties.content_encoding()),
            app_id: short_string(properties.app_id()),
            correlation_id: short_string(properties.correlation_id()),
            message_id: short_string(properties.message_id()),
            reply_to: short_string(properties.reply_to()),
            user_id: short_string(properties.user_id()),
            kind: short_string(properties.kind()),
            expiration: short_string(properties.expiration()),
            priority: properties.priority().unwrap_or_default(),
            delivery_mode: properties.delivery_mode().unwrap_or_default(),
            timestamp: properties
                .timestamp()
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            ..Self::default()
        }
    }
}

fn short_string(value: &Option<ShortString>) -> String {
    value
        .as_ref()
        .map(|s| s.as_str().to_string())
        .unwrap_or_default()
}
