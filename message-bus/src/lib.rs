//! Durable work queue over NATS
//!
//! Provides a queue channel with:
//! - JetStream work-queue streams for persistence and at-least-once delivery
//! - Explicit ack / nak / terminate per delivery
//! - Dead-letter destination for messages that cannot be processed
//! - In-memory queue with the same redelivery semantics for tests
//! - Observability via Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod channel;
pub mod client;
pub mod dead_letter;
pub mod error;
pub mod jetstream;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod publisher;
pub mod subscriber;
pub mod types;

pub use channel::{Acknowledger, Delivery, DeliveryStream, QueueChannel};
pub use client::{NatsClient, NatsConfig};
pub use dead_letter::DeadLetter;
pub use error::{Error, Result};
pub use jetstream::{JetStreamQueue, QueueConfig};
pub use memory::{MemoryQueue, QueueStats};
pub use message::Message;
pub use types::MessageKind;
