//! Message bus client

use crate::{metrics::NATS_CONNECTION_STATUS, Error, Result};
use async_nats::jetstream::{self, stream};
use std::time::Duration;
use tracing::{error, info};

/// NATS connection configuration
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// Server URL
    pub url: String,

    /// Connection name reported to the server
    pub connection_name: String,

    /// Connect timeout
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            connection_name: "message-bus".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Connected NATS client with a JetStream context
#[derive(Clone)]
pub struct NatsClient {
    jetstream: jetstream::Context,
}

impl NatsClient {
    /// Connect to the server
    ///
    /// Fails immediately if the server is unreachable; no reconnect loop on
    /// the initial connection.
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::ConnectOptions::new()
            .name(&config.connection_name)
            .connection_timeout(config.connect_timeout)
            .connect(config.url.as_str())
            .await
            .map_err(|e| {
                NATS_CONNECTION_STATUS.with_label_values(&["failed"]).inc();
                error!("Error connecting to NATS at {}: {}", config.url, e);
                Error::Connection(e.to_string())
            })?;

        NATS_CONNECTION_STATUS.with_label_values(&["connected"]).inc();
        info!("Connected to NATS at {}", config.url);

        Ok(Self {
            jetstream: jetstream::new(client),
        })
    }

    /// JetStream context
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Get a stream, creating it if missing
    pub async fn get_or_create_stream(&self, config: stream::Config) -> Result<stream::Stream> {
        let name = config.name.clone();

        match self.jetstream.get_or_create_stream(config).await {
            Ok(stream) => {
                info!("Stream {} ready", name);
                Ok(stream)
            }
            Err(e) => {
                error!("Failed to create stream {}: {}", name, e);
                Err(Error::StreamCreation(e.to_string()))
            }
        }
    }
}
