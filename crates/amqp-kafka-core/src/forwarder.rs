//! The forwarding loop.
//!
//! Each delivery is mapped to headers, published, and classified as
//! forwarded or skipped. Publishing is awaited before the next delivery is
//! pulled, so Kafka offsets follow inbound order. A failed publish is logged
//! and counted, never retried and never propagated: the loop always moves on
//! to the next delivery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use crate::delivery::Delivery;
use crate::headers::{self, format_rfc3339, map_headers, HeaderSet};
use crate::lifecycle::DeliveryStream;
use crate::metrics::BridgeMetrics;
use crate::publisher::Publisher;

/// Classification of one forwarding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Published; the message landed at this partition and offset.
    Forwarded { partition: i32, offset: i64 },
    /// The publish failed and the message was dropped.
    Skipped,
}

/// Tally of outcomes over one [`Forwarder::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub forwarded: u64,
    pub skipped: u64,
}

impl ForwardStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Forwarded { .. } => self.forwarded += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }

    /// Total deliveries handled.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.forwarded + self.skipped
    }
}

/// Relays deliveries to a [`Publisher`], recording outcomes in [`BridgeMetrics`].
pub struct Forwarder<P> {
    publisher: P,
    metrics: Arc<BridgeMetrics>,
}

impl<P: Publisher> Forwarder<P> {
    pub fn new(publisher: P, metrics: Arc<BridgeMetrics>) -> Self {
        Self { publisher, metrics }
    }

    #[must_use]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Forward deliveries until the stream closes.
    pub async fn run(&self, deliveries: &mut DeliveryStream) -> ForwardStats {
        info!(topic = self.publisher.topic(), "lift off");

        let mut stats = ForwardStats::default();
        while let Some(delivery) = deliveries.next().await {
            stats.record(self.forward(delivery).await);
        }

        info!(
            forwarded = stats.forwarded,
            skipped = stats.skipped,
            "delivery stream closed, forwarding stopped"
        );
        stats
    }

    /// Forward a single delivery, stamping it as received now.
    pub async fn forward(&self, delivery: Delivery) -> Outcome {
        self.forward_received(delivery, Utc::now()).await
    }

    /// Forward a single delivery received at `received_at`.
    #[instrument(
        skip_all,
        fields(delivery_tag = delivery.delivery_tag, routing_key = %delivery.routing_key)
    )]
    pub async fn forward_received(&self, delivery: Delivery, received_at: DateTime<Utc>) -> Outcome {
        let topic = self.publisher.topic();
        let headers = self.outbound_headers(&delivery, received_at);

        match self.publisher.publish(&headers, &delivery.body).await {
            Ok(receipt) => {
                debug!(
                    partition = receipt.partition,
                    offset = receipt.offset,
                    "forwarded"
                );
                self.metrics
                    .set_offset(topic, receipt.partition, receipt.offset);
                self.metrics.record_forwarded();
                Outcome::Forwarded {
                    partition: receipt.partition,
                    offset: receipt.offset,
                }
            }
            Err(e) => {
                error!(error = %e, topic, "skipping message");
                self.metrics.record_skipped();
                Outcome::Skipped
            }
        }
    }

    fn outbound_headers(&self, delivery: &Delivery, received_at: DateTime<Utc>) -> HeaderSet {
        let mut headers = map_headers(delivery);
        headers.insert(headers::X_RECEIVED, format_rfc3339(&received_at));
        headers.insert(headers::X_TOPIC, self.publisher.topic());
        headers
    }
}
