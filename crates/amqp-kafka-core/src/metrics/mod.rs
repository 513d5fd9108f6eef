//! Metrics collection for the AMQP to Kafka bridge.
//!
//! Provides Prometheus-compatible counters and gauges describing forwarding
//! outcomes and the last offset written per partition.

pub mod prometheus;

pub use prometheus::{BridgeMetrics, FORWARDED, SKIPPED};
