//! JetStream-backed work queue
//!
//! One work-queue stream per queue name, plus a limits-retention stream for
//! dead letters:
//! - `{name}` stream, subject `{name}.records`, file storage
//! - `{name}_dlq` stream, subject from [`QueueConfig::dead_letter_subject`]
//! - durable pull consumer with explicit acks

use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy, StorageType};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use crate::{
    channel::{DeliveryStream, QueueChannel},
    client::NatsClient,
    dead_letter::DeadLetter,
    message::Message,
    publisher::Publisher,
    subscriber::{Subscriber, SubscriberConfig},
    Result,
};

/// Queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue (stream) name
    pub name: String,

    /// Durable consumer name
    pub durable_name: String,

    /// Time the broker waits for a settle before redelivering
    pub ack_wait: Duration,

    /// Subject dead letters are published to
    pub dead_letter_subject: String,

    /// Publish deduplication window
    pub duplicate_window: Duration,
}

impl QueueConfig {
    /// Create config for a queue with defaults derived from its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            durable_name: format!("{}-consumer", name),
            dead_letter_subject: format!("{}.dead", name),
            ack_wait: Duration::from_secs(30),
            duplicate_window: Duration::from_secs(120),
            name,
        }
    }

    /// Subject records are published to
    pub fn subject(&self) -> String {
        format!("{}.records", self.name)
    }

    /// Name of the dead-letter stream
    pub fn dead_letter_stream(&self) -> String {
        format!("{}_dlq", self.name)
    }
}

/// Durable work queue on JetStream
pub struct JetStreamQueue {
    publisher: Publisher,
    subscriber: Subscriber,
}

impl JetStreamQueue {
    /// Ensure streams exist and build the queue
    pub async fn open(client: NatsClient, config: QueueConfig) -> Result<Self> {
        info!("Initializing JetStream queue {}", config.name);

        client
            .get_or_create_stream(StreamConfig {
                name: config.name.clone(),
                description: Some(format!("Work queue {}", config.name)),
                subjects: vec![config.subject()],
                retention: RetentionPolicy::WorkQueue,
                storage: StorageType::File,
                duplicate_window: config.duplicate_window,
                ..Default::default()
            })
            .await?;

        client
            .get_or_create_stream(StreamConfig {
                name: config.dead_letter_stream(),
                description: Some(format!("Dead letters for {}", config.name)),
                subjects: vec![config.dead_letter_subject.clone()],
                retention: RetentionPolicy::Limits,
                storage: StorageType::File,
                max_age: Duration::from_secs(30 * 24 * 3600), // 30 days
                ..Default::default()
            })
            .await?;

        let publisher = Publisher::new(
            client.clone(),
            config.name.clone(),
            config.subject(),
            config.dead_letter_subject.clone(),
        );

        let subscriber = Subscriber::new(
            client,
            SubscriberConfig {
                stream_name: config.name.clone(),
                filter_subject: config.subject(),
                durable_name: config.durable_name.clone(),
                ack_wait: config.ack_wait,
            },
        );

        info!("Connected to JetStream queue {}", config.name);
        Ok(Self {
            publisher,
            subscriber,
        })
    }
}

#[async_trait]
impl QueueChannel for JetStreamQueue {
    async fn enqueue(&self, message: Message) -> Result<()> {
        self.publisher.publish(&message).await
    }

    async fn subscribe(&self) -> Result<DeliveryStream> {
        self.subscriber.deliveries().await
    }

    async fn dead_letter(&self, dead_letter: DeadLetter) -> Result<()> {
        self.publisher.publish_dead_letter(&dead_letter).await
    }
}
