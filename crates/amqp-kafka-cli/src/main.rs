//! AMQP to Kafka Bridge CLI
//!
//! Consumes messages from an AMQP queue and republishes them to a Kafka
//! topic, carrying message metadata over as record headers.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use amqp_kafka_core::config::{BridgeConfig, LoggingConfig};
use amqp_kafka_core::{
    spawn_signal_watcher, AmqpConsumer, BridgeMetrics, Forwarder, KafkaPublisher, Publisher,
    ShutdownHandle,
};

/// AMQP to Kafka bridge.
#[derive(Parser)]
#[command(name = "amqp-kafka-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Override the destination Kafka topic.
    #[arg(long)]
    topic: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::from_file(&args.config)?;

    if let Some(topic) = args.topic {
        config.kafka.topic = topic;
        config.validate()?;
    }

    let log_config = match args.verbose {
        0 => config.logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..config.logging.clone()
        },
    };

    setup_tracing(&log_config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        queue = %config.amqp.queue,
        exchange = %config.amqp.exchange,
        topic = %config.kafka.topic,
        "starting amqp kafka bridge"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move { run_bridge(config).await })
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber.with(fmt::layer()).init();
    }
}

async fn run_bridge(config: BridgeConfig) -> anyhow::Result<()> {
    let metrics = Arc::new(BridgeMetrics::new());

    info!(
        bootstrap_servers = ?config.kafka.bootstrap_servers,
        "creating kafka producer"
    );
    let publisher = KafkaPublisher::new(&config.kafka)?;

    let shutdown = ShutdownHandle::new();
    let mut consumer = AmqpConsumer::connect(&config.amqp).await?;

    if config.metrics.enabled {
        let listener = TcpListener::bind(config.metrics.socket_addr()?).await?;
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(listener, metrics).await {
                tracing::error!(error = %e, "metrics server error");
            }
        });
    }

    let signals = spawn_signal_watcher(shutdown.clone());

    let mut deliveries = consumer.deliveries(&shutdown);
    let forwarder = Forwarder::new(publisher, metrics);
    forwarder.run(&mut deliveries).await;

    signals.abort();
    consumer.shutdown().await;
    forwarder.publisher().shutdown().await;

    info!("shut down");
    Ok(())
}

async fn serve_metrics(
    listener: TcpListener,
    metrics: Arc<BridgeMetrics>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use hyper_util::rt::TokioIo;

    let addr: SocketAddr = listener.local_addr()?;
    info!(address = %addr, "metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = Arc::clone(&metrics);

        tokio::spawn(async move {
            let service = service_fn(move |_req: Request<hyper::body::Incoming>| {
                let metrics = Arc::clone(&metrics);
                async move {
                    let body = metrics.encode().unwrap_or_default();
                    Ok::<_, hyper::Error>(Response::new(Full::new(Bytes::from(body))))
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, "metrics connection error");
            }
        });
    }
}
