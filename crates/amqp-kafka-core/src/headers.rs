//! Mapping of AMQP delivery metadata onto Kafka record headers.
//!
//! The mapping is lossy by construction: fields that are empty, zero where
//! zero means "unset", or carry a sentinel timestamp are omitted instead of
//! being encoded as empty header values.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};

use crate::delivery::Delivery;

pub const APP_ID: &str = "AppId";
pub const CONTENT_TYPE: &str = "ContentType";
pub const CONTENT_ENCODING: &str = "ContentEncoding";
pub const CONSUMER_TAG: &str = "ConsumerTag";
pub const CORRELATION_ID: &str = "CorrelationId";
pub const DELIVERY_MODE: &str = "DeliveryMode";
pub const EXCHANGE: &str = "Exchange";
pub const EXPIRATION: &str = "Expiration";
pub const MESSAGE_ID: &str = "MessageId";
pub const PRIORITY: &str = "Priority";
pub const REPLY_TO: &str = "ReplyTo";
pub const ROUTING_KEY: &str = "RoutingKey";
pub const TYPE: &str = "Type";
pub const USER_ID: &str = "UserId";
pub const DELIVERY_TAG: &str = "DeliveryTag";
pub const MESSAGE_COUNT: &str = "MessageCount";
pub const TIMESTAMP: &str = "Timestamp";

/// Time the bridge picked the delivery up.
pub const X_RECEIVED: &str = "X-Received";
/// Destination topic the message was forwarded to.
pub const X_TOPIC: &str = "X-Topic";

/// Timestamps whose year is at or before this one are treated as unset.
const TIMESTAMP_SENTINEL_YEAR: i32 = 1980;

/// String headers attached to an outbound record.
///
/// Never holds an entry with an empty value: [`HeaderSet::insert`] drops
/// empty values instead of storing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: HashMap<String, String>,
}

impl HeaderSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header. Empty values are ignored, and an existing entry
    /// with the same name is left untouched in that case.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.entries.insert(name.into(), value);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Format a timestamp as UTC RFC 3339 with second precision, e.g.
/// `2024-03-01T12:00:00Z`.
#[must_use]
pub fn format_rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the header set for one delivery.
///
/// Always succeeds; absent or unset fields simply produce no header.
#[must_use]
pub fn map_headers(delivery: &Delivery) -> HeaderSet {
    let mut headers = HeaderSet::new();

    headers.insert(APP_ID, delivery.app_id.as_str());
    headers.insert(CONTENT_TYPE, delivery.content_type.as_str());
    headers.insert(CONTENT_ENCODING, delivery.content_encoding.as_str());
    headers.insert(CONSUMER_TAG, delivery.consumer_tag.as_str());
    headers.insert(CORRELATION_ID, delivery.correlation_id.as_str());
    headers.insert(
        DELIVERY_MODE,
        delivery.mode().map_or("", |mode| mode.label()),
    );
    headers.insert(EXCHANGE, delivery.exchange.as_str());
    headers.insert(EXPIRATION, delivery.expiration.as_str());
    headers.insert(MESSAGE_ID, delivery.message_id.as_str());
    headers.insert(PRIORITY, delivery.priority.to_string());
    headers.insert(REPLY_TO, delivery.reply_to.as_str());
    headers.insert(ROUTING_KEY, delivery.routing_key.as_str());
    headers.insert(TYPE, delivery.kind.as_str());
    headers.insert(USER_ID, delivery.user_id.as_str());

    if delivery.delivery_tag != 0 {
        headers.insert(DELIVERY_TAG, format!("{:x}", delivery.delivery_tag));
    }
    if delivery.message_count > 0 {
        headers.insert(MESSAGE_COUNT, delivery.message_count.to_string());
    }
    if let Some(timestamp) = delivery
        .timestamp
        .filter(|ts| ts.year() > TIMESTAMP_SENTINEL_YEAR)
    {
        headers.insert(TIMESTAMP, format_rfc3339(&timestamp));
    }

    headers
}
