//! AMQP to Kafka Bridge Core Library
//!
//! This library relays messages from an AMQP queue to a Kafka topic. Each
//! delivery's metadata is carried over as Kafka record headers, the payload is
//! passed through unchanged, and every message is classified as forwarded or
//! skipped. A failed publish never stops the pipeline.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`delivery`] - The inbound message model
//! - [`headers`] - Delivery metadata to header mapping
//! - [`publisher`] - Kafka publishing
//! - [`forwarder`] - The forwarding loop
//! - [`lifecycle`] - Shutdown coordination and the cancellable delivery stream
//! - [`consumer`] - AMQP connection, topology and consumption
//! - [`metrics`] - Prometheus metrics collection
//! - [`tls`] - CA certificate loading for AMQP over TLS
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use amqp_kafka_core::{AmqpConsumer, BridgeConfig, BridgeMetrics, Forwarder, KafkaPublisher, ShutdownHandle};
//!
//! let config = BridgeConfig::from_file("config.yaml")?;
//! let shutdown = ShutdownHandle::new();
//! let mut consumer = AmqpConsumer::connect(&config.amqp).await?;
//! let forwarder = Forwarder::new(KafkaPublisher::new(&config.kafka)?, Arc::new(BridgeMetrics::new()));
//! forwarder.run(&mut consumer.deliveries(&shutdown)).await;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod consumer;
pub mod delivery;
pub mod error;
pub mod forwarder;
pub mod headers;
pub mod lifecycle;
pub mod metrics;
pub mod publisher;
pub mod tls;

/// Test utilities for integration testing.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::{AmqpConfig, BridgeConfig, KafkaConfig, LoggingConfig, MetricsConfig};
pub use consumer::AmqpConsumer;
pub use delivery::{Delivery, DeliveryMode};
pub use error::{BridgeError, ConfigError, PublishError, Result, TlsError};
pub use forwarder::{ForwardStats, Forwarder, Outcome};
pub use headers::{map_headers, HeaderSet};
pub use lifecycle::{spawn_signal_watcher, DeliveryStream, ShutdownHandle};
pub use metrics::BridgeMetrics;
pub use publisher::{KafkaPublisher, PublishReceipt, Publisher};
