//! JetStream subscriber with a durable pull consumer

use crate::{
    channel::{Acknowledger, Delivery, DeliveryStream},
    client::NatsClient,
    message::Message,
    metrics::MESSAGE_RECEIVE_TOTAL,
    Error, Result,
};
use async_nats::jetstream::{self, consumer, AckKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::info;

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Stream to consume from
    pub stream_name: String,

    /// Subject filter
    pub filter_subject: String,

    /// Durable consumer name
    pub durable_name: String,

    /// Time the broker waits for a settle before redelivering
    pub ack_wait: Duration,
}

/// Message subscriber
pub struct Subscriber {
    client: NatsClient,
    config: SubscriberConfig,
}

impl Subscriber {
    /// Create new subscriber
    pub fn new(client: NatsClient, config: SubscriberConfig) -> Self {
        Self { client, config }
    }

    /// Create (or reuse) the durable consumer and stream its deliveries
    pub async fn deliveries(&self) -> Result<DeliveryStream> {
        info!(
            "Subscribing to JetStream stream: {} (consumer: {})",
            self.config.stream_name, self.config.durable_name
        );

        let stream = self
            .client
            .jetstream()
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        // Redelivery is capped by the caller so it can dead-letter; the broker
        // itself redelivers without limit.
        let consumer_config = consumer::pull::Config {
            durable_name: Some(self.config.durable_name.clone()),
            filter_subject: self.config.filter_subject.clone(),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.config.ack_wait,
            max_deliver: -1,
            deliver_policy: consumer::DeliverPolicy::All,
            ..Default::default()
        };

        let consumer = stream
            .get_or_create_consumer(&self.config.durable_name, consumer_config)
            .await
            .map_err(|e| Error::ConsumerCreation(e.to_string()))?;

        info!("JetStream consumer {} ready", self.config.durable_name);

        let messages = consumer
            .messages()
            .await
            .map_err(|e| Error::Subscribe(e.to_string()))?;

        let queue = self.config.stream_name.clone();
        let deliveries = messages.map(move |item| match item {
            Ok(msg) => {
                MESSAGE_RECEIVE_TOTAL
                    .with_label_values(&[queue.as_str(), "success"])
                    .inc();
                Ok(into_delivery(msg))
            }
            Err(e) => {
                MESSAGE_RECEIVE_TOTAL
                    .with_label_values(&[queue.as_str(), "error"])
                    .inc();
                Err(Error::Subscribe(e.to_string()))
            }
        });

        Ok(deliveries.boxed())
    }
}

fn into_delivery(msg: jetstream::Message) -> Delivery {
    let delivery_count = msg
        .info()
        .ok()
        .and_then(|info| u64::try_from(info.delivered).ok())
        .unwrap_or(1);

    let headers = msg.headers.clone();
    let message = Message::from_headers(
        |name| {
            headers
                .as_ref()
                .and_then(|h| h.get(name))
                .map(|value| value.as_str().to_string())
        },
        msg.payload.clone(),
    );

    Delivery::new(message, delivery_count, Box::new(JetStreamAcker { message: msg }))
}

/// Settles a JetStream message
struct JetStreamAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for JetStreamAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| Error::Acknowledge(e.to_string()))
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| Error::Acknowledge(e.to_string()))
    }

    async fn term(self: Box<Self>) -> Result<()> {
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| Error::Acknowledge(e.to_string()))
    }
}
