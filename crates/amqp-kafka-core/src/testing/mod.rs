//! Test utilities for the AMQP to Kafka bridge.
//!
//! - [`MockPublisher`] - an in-memory [`Publisher`](crate::publisher::Publisher)
//!   with scripted outcomes
//! - [`deliveries`] / [`delivery_with_tag`] - delivery builders
//!
//! # Example
//!
//! ```rust,ignore
//! use amqp_kafka_core::testing::{deliveries, MockPublisher};
//!
//! let publisher = MockPublisher::new("events");
//! publisher.fail_next("broker unreachable");
//! ```

pub mod mock_publisher;

pub use mock_publisher::{MockPublisher, PublishedMessage};

use crate::delivery::Delivery;

/// A delivery with the given tag and a payload naming it.
#[must_use]
pub fn delivery_with_tag(tag: u64) -> Delivery {
    Delivery {
        body: format!("message-{tag}").into(),
        delivery_tag: tag,
        ..Delivery::default()
    }
}

/// `count` deliveries tagged 1 through `count`.
#[must_use]
pub fn deliveries(count: u64) -> Vec<Delivery> {
    (1..=count).map(delivery_with_tag).collect()
}
