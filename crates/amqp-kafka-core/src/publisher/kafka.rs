//! rdkafka-backed publisher.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info, instrument, warn};

use super::{PublishReceipt, Publisher};
use crate::config::KafkaConfig;
use crate::error::{PublishError, PublishResult, Result};
use crate::headers::HeaderSet;

/// Publishes to a single Kafka topic through a [`FutureProducer`].
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    /// Create a producer for the configured topic.
    ///
    /// librdkafka connects lazily, so this only fails on invalid client
    /// configuration, not on unreachable brokers.
    ///
    /// # Errors
    ///
    /// Returns an error if the producer cannot be created.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = client_config(config).create()?;

        info!(
            bootstrap_servers = ?config.bootstrap_servers,
            topic = %config.topic,
            security_protocol = config.security_protocol.as_str(),
            "kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            flush_timeout: Duration::from_millis(config.flush_timeout_ms),
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    #[instrument(skip_all, fields(topic = %self.topic, bytes = payload.len()))]
    async fn publish(&self, headers: &HeaderSet, payload: &[u8]) -> PublishResult<PublishReceipt> {
        let record = FutureRecord::<(), [u8]>::to(&self.topic)
            .payload(payload)
            .headers(record_headers(headers));

        // Enqueueing waits for queue space indefinitely; delivery itself is
        // bounded by `message.timeout.ms`.
        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                debug!(partition, offset, "message delivered");
                Ok(PublishReceipt { partition, offset })
            }
            Err((err, _message)) => Err(PublishError::from(err)),
        }
    }

    async fn shutdown(&self) {
        info!(
            in_flight = self.producer.in_flight_count(),
            "flushing kafka producer"
        );
        if let Err(e) = self.producer.flush(Timeout::After(self.flush_timeout)) {
            warn!(error = %e, "kafka producer flush did not complete");
        }
    }
}

/// Encode a header set as Kafka record headers.
fn record_headers(headers: &HeaderSet) -> OwnedHeaders {
    headers
        .iter()
        .fold(OwnedHeaders::new_with_capacity(headers.len()), |acc, (key, value)| {
            acc.insert(Header {
                key,
                value: Some(value),
            })
        })
}

/// Build the librdkafka client configuration for the producer.
#[must_use]
pub fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.bootstrap_servers.join(","))
        .set("client.id", &config.client_id)
        .set("acks", &config.acks)
        .set("message.timeout.ms", config.message_timeout_ms.to_string())
        .set("security.protocol", config.security_protocol.as_str());

    if let Some(tls) = config
        .tls
        .as_ref()
        .filter(|_| config.security_protocol.requires_tls())
    {
        if let Some(path) = &tls.ca_cert_path {
            client.set("ssl.ca.location", path.display().to_string());
        }
        if let Some(path) = &tls.cert_path {
            client.set("ssl.certificate.location", path.display().to_string());
        }
        if let Some(path) = &tls.key_path {
            client.set("ssl.key.location", path.display().to_string());
        }
    }

    if let Some(sasl) = config
        .sasl
        .as_ref()
        .filter(|_| config.security_protocol.requires_sasl())
    {
        client
            .set("sasl.mechanisms", sasl.mechanism.mechanism_name())
            .set("sasl.username", sasl.username())
            .set("sasl.password", sasl.password());
    }

    for (key, value) in &config.properties {
        client.set(key, value);
    }

    client
}
