//! Prometheus metrics for the AMQP to Kafka bridge.
//!
//! The registry is constructed explicitly and shared by reference; nothing
//! here is a process global.

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

/// Outcome label for a message published to Kafka.
pub const FORWARDED: &str = "forwarded";
/// Outcome label for a message whose publish failed and was dropped.
pub const SKIPPED: &str = "skipped";

/// Bridge metrics collection.
pub struct BridgeMetrics {
    /// The Prometheus registry.
    pub registry: Registry,

    /// Messages handled, by outcome.
    pub messages_total: IntCounterVec,

    /// Last offset written, by topic and partition.
    pub partition_offset: IntGaugeVec,
}

impl BridgeMetrics {
    /// Create a new metrics collection.
    ///
    /// # Panics
    ///
    /// Panics if metric registration fails (should not happen with unique names).
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let messages_total = IntCounterVec::new(
            Opts::new(
                "amqp_kafka_messages_total",
                "Total number of AMQP deliveries handled, by outcome",
            ),
            &["status"],
        )
        .expect("metric creation should succeed");

        let partition_offset = IntGaugeVec::new(
            Opts::new(
                "amqp_kafka_partition_offset",
                "Offset of the last message written to each Kafka partition",
            ),
            &["topic", "partition"],
        )
        .expect("metric creation should succeed");

        registry
            .register(Box::new(messages_total.clone()))
            .expect("metric registration should succeed");
        registry
            .register(Box::new(partition_offset.clone()))
            .expect("metric registration should succeed");

        // Both outcome series exist from the start so a scrape before the
        // first message reports zeros instead of missing series.
        messages_total.with_label_values(&[FORWARDED]);
        messages_total.with_label_values(&[SKIPPED]);

        Self {
            registry,
            messages_total,
            partition_offset,
        }
    }

    /// Record a message forwarded to Kafka.
    pub fn record_forwarded(&self) {
        self.messages_total.with_label_values(&[FORWARDED]).inc();
    }

    /// Record a message skipped after a failed publish.
    pub fn record_skipped(&self) {
        self.messages_total.with_label_values(&[SKIPPED]).inc();
    }

    /// Set the last-seen offset for a partition.
    pub fn set_offset(&self, topic: &str, partition: i32, offset: i64) {
        self.partition_offset
            .with_label_values(&[topic, &partition.to_string()])
            .set(offset);
    }

    /// Number of forwarded messages so far.
    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.messages_total.with_label_values(&[FORWARDED]).get()
    }

    /// Number of skipped messages so far.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.messages_total.with_label_values(&[SKIPPED]).get()
    }

    /// Last offset recorded for a partition, if any was recorded.
    ///
    /// Reads from a gathered snapshot so that looking up an unseen partition
    /// does not create an empty series for it.
    #[must_use]
    pub fn offset(&self, topic: &str, partition: i32) -> Option<i64> {
        let partition = partition.to_string();
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "amqp_kafka_partition_offset")
            .flat_map(|family| family.get_metric())
            .find(|metric| {
                let labels = metric.get_label();
                let has = |name: &str, value: &str| {
                    labels
                        .iter()
                        .any(|l| l.get_name() == name && l.get_value() == value)
                };
                has("topic", topic) && has("partition", &partition)
            })
            .map(|metric| metric.get_gauge().get_value() as i64)
    }

    /// Encode metrics in Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = BridgeMetrics::new();
        let output = metrics.encode().unwrap();
        assert!(output.contains("amqp_kafka_messages_total{status=\"forwarded\"} 0"));
        assert!(output.contains("amqp_kafka_messages_total{status=\"skipped\"} 0"));
    }

    #[test]
    fn test_outcome_counters() {
        let metrics = BridgeMetrics::new();
        metrics.record_forwarded();
        metrics.record_forwarded();
        metrics.record_skipped();

        assert_eq!(metrics.forwarded(), 2);
        assert_eq!(metrics.skipped(), 1);
    }

    #[test]
    fn test_offset_gauge() {
        let metrics = BridgeMetrics::new();
        assert_eq!(metrics.offset("events", 2), None);

        metrics.set_offset("events", 2, 42);
        assert_eq!(metrics.offset("events", 2), Some(42));
        assert_eq!(metrics.offset("events", 3), None);
        assert_eq!(metrics.offset("other", 2), None);

        let output = metrics.encode().unwrap();
        assert!(output.contains("amqp_kafka_partition_offset{partition=\"2\",topic=\"events\"} 42"));
    }

    #[test]
    fn test_offset_gauge_is_idempotent() {
        let metrics = BridgeMetrics::new();
        metrics.set_offset("events", 0, 7);
        let before = metrics.encode().unwrap();
        metrics.set_offset("events", 0, 7);
        assert_eq!(metrics.encode().unwrap(), before);
        assert_eq!(metrics.offset("events", 0), Some(7));
    }

    #[test]
    fn test_offset_gauge_tracks_latest() {
        let metrics = BridgeMetrics::new();
        metrics.set_offset("events", 1, 10);
        metrics.set_offset("events", 1, 11);
        assert_eq!(metrics.offset("events", 1), Some(11));
    }
}
