//! AMQP inbound side: connection, topology and the delivery stream.
//!
//! The consumer declares its exchange and queue, binds them, and starts a
//! basic.consume. Acknowledgment is a consumer setting (`auto_ack`); the
//! forwarding loop never acknowledges or rejects anything itself.
//!
//! Shutdown sends basic.cancel and keeps the delivery stream open until the
//! client ends it on cancel-ok, so deliveries the broker pushed before the
//! cancel are still forwarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future;
use futures::stream::{self, StreamExt};
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::tcp::OwnedTLSConfig;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use tracing::{error, info, instrument, warn};

use crate::config::{AmqpConfig, ExchangeKind};
use crate::delivery::Delivery;
use crate::error::Result;
use crate::lifecycle::{DeliveryStream, ShutdownHandle};
use crate::tls;

const REPLY_SUCCESS: u16 = 200;

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => Self::Direct,
            ExchangeKind::Fanout => Self::Fanout,
            ExchangeKind::Topic => Self::Topic,
            ExchangeKind::Headers => Self::Headers,
        }
    }
}

/// A running AMQP consumer.
pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    consumer: Option<Consumer>,
    consumer_tag: String,
    cancelled: Arc<AtomicBool>,
}

impl AmqpConsumer {
    /// Connect, declare topology and start consuming.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA chain cannot be loaded, the connection
    /// fails, or any topology or consume call is refused by the broker.
    #[instrument(skip_all, fields(queue = %config.queue, exchange = %config.exchange))]
    pub async fn connect(config: &AmqpConfig) -> Result<Self> {
        let uri = config.uri();
        let properties = ConnectionProperties::default();

        let connection = match &config.ca_cert_path {
            Some(path) => {
                let tls_config = OwnedTLSConfig {
                    cert_chain: Some(tls::load_ca_chain(path)?),
                    ..OwnedTLSConfig::default()
                };
                Connection::connect_with_config(&uri, properties, tls_config).await?
            }
            None => Connection::connect(&uri, properties).await?,
        };
        info!(tls = config.is_tls(), "connected to amqp broker");

        let channel = connection.create_channel().await?;

        if config.prefetch_count > 0 {
            channel
                .basic_qos(config.prefetch_count, BasicQosOptions::default())
                .await?;
        }

        if !config.exchange.is_empty() {
            channel
                .exchange_declare(
                    &config.exchange,
                    config.exchange_kind.into(),
                    ExchangeDeclareOptions {
                        durable: true,
                        ..ExchangeDeclareOptions::default()
                    },
                    FieldTable::default(),
                )
                .await?;
        }

        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        if !config.exchange.is_empty() {
            channel
                .queue_bind(
                    &config.queue,
                    &config.exchange,
                    &config.binding_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        let consumer = channel
            .basic_consume(
                &config.queue,
                &config.consumer_tag,
                BasicConsumeOptions {
                    no_ack: config.auto_ack,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(
            binding_key = %config.binding_key,
            consumer_tag = %config.consumer_tag,
            auto_ack = config.auto_ack,
            "amqp consumer started"
        );

        Ok(Self {
            connection,
            channel,
            consumer: Some(consumer),
            consumer_tag: config.consumer_tag.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Take the delivery stream, stopped by `shutdown`.
    ///
    /// On shutdown the stream cancels the consumer and drains it until the
    /// client ends it. The consumer has one stream; asking again returns an
    /// empty one.
    pub fn deliveries(&mut self, shutdown: &ShutdownHandle) -> DeliveryStream {
        let Some(consumer) = self.consumer.take() else {
            warn!("delivery stream already taken");
            return DeliveryStream::new(stream::empty(), shutdown);
        };

        let consumer_tag = self.consumer_tag.clone();
        let deliveries = consumer.filter_map(move |result| {
            future::ready(match result {
                Ok(delivery) => Some(Delivery::from_amqp(delivery, &consumer_tag)),
                Err(e) => {
                    error!(error = %e, "amqp consumer error");
                    None
                }
            })
        });

        let channel = self.channel.clone();
        let consumer_tag = self.consumer_tag.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let cancel = async move {
            cancel_consumer(&channel, &consumer_tag, &cancelled).await;
        };

        DeliveryStream::with_cancel(deliveries, shutdown, cancel)
    }

    /// Cancel the consumer, if the stream has not already done so, and close
    /// the channel and connection.
    ///
    /// Failures are logged: at this point the process is exiting anyway.
    pub async fn shutdown(&self) {
        cancel_consumer(&self.channel, &self.consumer_tag, &self.cancelled).await;
        if let Err(e) = self.channel.close(REPLY_SUCCESS, "bridge shutdown").await {
            warn!(error = %e, "failed to close amqp channel");
        }
        if let Err(e) = self.connection.close(REPLY_SUCCESS, "bridge shutdown").await {
            warn!(error = %e, "failed to close amqp connection");
        }
        info!("amqp consumer shut down");
    }
}

/// Send basic.cancel once per consumer.
async fn cancel_consumer(channel: &Channel, consumer_tag: &str, cancelled: &AtomicBool) {
    if cancelled.swap(true, Ordering::SeqCst) {
        return;
    }
    match channel
        .basic_cancel(consumer_tag, BasicCancelOptions::default())
        .await
    {
        Ok(()) => info!(consumer_tag, "amqp consumer cancelled"),
        Err(e) => warn!(error = %e, "failed to cancel amqp consumer"),
    }
}
