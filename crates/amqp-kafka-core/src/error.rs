//! Domain error types for the AMQP to Kafka bridge.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.

use thiserror::Error;

/// Errors related to configuration parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A required string setting was left empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// No Kafka bootstrap servers were configured.
    #[error("kafka.bootstrap_servers must list at least one broker")]
    NoBootstrapServers,

    /// The AMQP URI does not use a supported scheme.
    #[error("invalid AMQP URI '{0}' (expected amqp:// or amqps://)")]
    InvalidAmqpUri(String),

    /// A CA certificate was configured for a plaintext AMQP connection.
    #[error("amqp.ca_cert_path requires an amqps:// URI")]
    CertificateWithoutTls,

    /// Invalid address format.
    #[error("invalid address format: {0} (expected 'host:port')")]
    InvalidAddress(String),
}

/// Errors loading TLS material.
#[derive(Error, Debug)]
pub enum TlsError {
    /// The certificate file could not be read.
    #[error("failed to load certificate from '{path}': {message}")]
    CertificateLoad { path: String, message: String },

    /// The file was readable but held no PEM certificates.
    #[error("no certificates found in '{0}'")]
    NoCertificates(String),
}

/// Errors that abort bridge startup.
///
/// Steady-state forwarding never produces these; a failed publish is
/// a [`PublishError`] and is handled inside the forwarding loop.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// AMQP connection, channel or topology error.
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    /// Kafka producer creation failed.
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// TLS material could not be loaded.
    #[error("tls error: {0}")]
    Tls(#[from] TlsError),

    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// A failed publish attempt.
///
/// Deliberately opaque: the forwarding loop treats every failure the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("publish failed: {message}")]
pub struct PublishError {
    message: String,
}

impl PublishError {
    /// Create a publish error from any description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<rdkafka::error::KafkaError> for PublishError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type alias for startup operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for TLS operations.
pub type TlsResult<T> = std::result::Result<T, TlsError>;

/// Result type alias for publish operations.
pub type PublishResult<T> = std::result::Result<T, PublishError>;
