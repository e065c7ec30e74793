//! Queue channel abstraction
//!
//! A [`QueueChannel`] accepts messages with [`QueueChannel::enqueue`] and hands
//! them back as [`Delivery`] values. Every delivery must be settled exactly
//! once: `ack`, `nack` (redeliver) or `term` (drop for good). The settle
//! methods take the delivery by value, so settling twice does not compile.

use crate::{
    dead_letter::DeadLetter,
    message::Message,
    metrics::MESSAGE_SETTLE_TOTAL,
    Result,
};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of deliveries from a subscription
pub type DeliveryStream = BoxStream<'static, Result<Delivery>>;

/// Durable work queue
#[async_trait]
pub trait QueueChannel: Send + Sync {
    /// Enqueue a message; returns once the broker has accepted it
    async fn enqueue(&self, message: Message) -> Result<()>;

    /// Start receiving deliveries
    async fn subscribe(&self) -> Result<DeliveryStream>;

    /// Move a message to the dead-letter destination
    async fn dead_letter(&self, dead_letter: DeadLetter) -> Result<()>;
}

/// Broker-side handle used to settle a delivery
#[async_trait]
pub trait Acknowledger: Send {
    /// Message fully processed
    async fn ack(self: Box<Self>) -> Result<()>;

    /// Processing failed, redeliver
    async fn nack(self: Box<Self>) -> Result<()>;

    /// Processing can never succeed, do not redeliver
    async fn term(self: Box<Self>) -> Result<()>;
}

/// A delivered message plus its settle handle
pub struct Delivery {
    message: Message,
    delivery_count: u64,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Create new delivery
    pub fn new(message: Message, delivery_count: u64, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            message,
            delivery_count,
            acker,
        }
    }

    /// Delivered message
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// How many times this message has been delivered, including this one
    pub fn delivery_count(&self) -> u64 {
        self.delivery_count
    }

    /// Acknowledge
    pub async fn ack(self) -> Result<()> {
        MESSAGE_SETTLE_TOTAL.with_label_values(&["ack"]).inc();
        self.acker.ack().await
    }

    /// Negative acknowledgement, the broker redelivers
    pub async fn nack(self) -> Result<()> {
        MESSAGE_SETTLE_TOTAL.with_label_values(&["nack"]).inc();
        self.acker.nack().await
    }

    /// Terminate, the broker drops the message
    pub async fn term(self) -> Result<()> {
        MESSAGE_SETTLE_TOTAL.with_label_values(&["term"]).inc();
        self.acker.term().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("delivery_count", &self.delivery_count)
            .finish_non_exhaustive()
    }
}
