//! In-process work queue
//!
//! Same delivery contract as the JetStream queue: FIFO, a nacked delivery goes
//! back to the tail with its delivery count kept, and a delivery dropped
//! without being settled is redelivered as if its ack wait had expired.

use crate::{
    channel::{Acknowledger, Delivery, DeliveryStream, QueueChannel},
    dead_letter::DeadLetter,
    message::Message,
    Error, Result,
};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

struct Pending {
    message: Message,
    delivery_count: u64,
}

/// Settle counters
#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    acked: AtomicU64,
    nacked: AtomicU64,
    terminated: AtomicU64,
    abandoned: AtomicU64,
}

/// Snapshot of a [`MemoryQueue`]'s settle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Deliveries handed out, redeliveries included
    pub delivered: u64,
    /// Deliveries acked
    pub acked: u64,
    /// Deliveries nacked
    pub nacked: u64,
    /// Deliveries terminated
    pub terminated: u64,
    /// Deliveries dropped without being settled
    pub abandoned: u64,
}

impl QueueStats {
    /// Deliveries that received a terminal call
    pub fn settled(&self) -> u64 {
        self.acked + self.nacked + self.terminated
    }
}

/// In-memory queue channel
pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<Pending>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Pending>>>,
    enqueued: Mutex<Vec<Message>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    counters: Arc<Counters>,
    enqueue_limit: Option<usize>,
}

impl MemoryQueue {
    /// Create new queue
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            enqueued: Mutex::new(Vec::new()),
            dead_letters: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
            enqueue_limit: None,
        }
    }

    /// Queue that rejects every enqueue after the first `limit`
    pub fn with_enqueue_limit(limit: usize) -> Self {
        Self {
            enqueue_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Every message accepted so far, in enqueue order
    pub fn enqueued(&self) -> Vec<Message> {
        self.enqueued.lock().clone()
    }

    /// Dead-lettered entries
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    /// Settle counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            acked: self.counters.acked.load(Ordering::SeqCst),
            nacked: self.counters.nacked.load(Ordering::SeqCst),
            terminated: self.counters.terminated.load(Ordering::SeqCst),
            abandoned: self.counters.abandoned.load(Ordering::SeqCst),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueChannel for MemoryQueue {
    async fn enqueue(&self, message: Message) -> Result<()> {
        let mut enqueued = self.enqueued.lock();
        if let Some(limit) = self.enqueue_limit {
            if enqueued.len() >= limit {
                return Err(Error::Publish(format!(
                    "memory queue rejects enqueue beyond {} messages",
                    limit
                )));
            }
        }

        enqueued.push(message.clone());
        self.sender
            .send(Pending {
                message,
                delivery_count: 0,
            })
            .map_err(|_| Error::Publish("memory queue closed".to_string()))
    }

    async fn subscribe(&self) -> Result<DeliveryStream> {
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| Error::Subscribe("memory queue already has a subscriber".to_string()))?;

        let sender = self.sender.clone();
        let counters = Arc::clone(&self.counters);

        let deliveries = UnboundedReceiverStream::new(receiver).map(move |mut pending| {
            pending.delivery_count += 1;
            counters.delivered.fetch_add(1, Ordering::SeqCst);

            let message = pending.message.clone();
            let delivery_count = pending.delivery_count;
            let acker = MemoryAcker {
                pending: Some(pending),
                sender: sender.clone(),
                counters: Arc::clone(&counters),
            };
            Ok(Delivery::new(message, delivery_count, Box::new(acker)))
        });

        Ok(deliveries.boxed())
    }

    async fn dead_letter(&self, dead_letter: DeadLetter) -> Result<()> {
        self.dead_letters.lock().push(dead_letter);
        Ok(())
    }
}

struct MemoryAcker {
    pending: Option<Pending>,
    sender: mpsc::UnboundedSender<Pending>,
    counters: Arc<Counters>,
}

impl MemoryAcker {
    fn requeue(&mut self) {
        if let Some(pending) = self.pending.take() {
            if self.sender.send(pending).is_err() {
                debug!("Memory queue closed, dropping redelivery");
            }
        }
    }
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.pending = None;
        this.counters.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.requeue();
        this.counters.nacked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn term(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.pending = None;
        this.counters.terminated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if self.pending.is_some() {
            self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
            self.requeue();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKind;
    use uuid::Uuid;

    fn record(run_id: Uuid, sequence: u64) -> Message {
        Message::record(run_id, sequence, format!("{{\"n\":{}}}", sequence).into_bytes())
    }

    #[tokio::test]
    async fn test_fifo_delivery_and_ack() {
        let queue = MemoryQueue::new();
        let run_id = Uuid::now_v7();
        queue.enqueue(record(run_id, 1)).await.unwrap();
        queue.enqueue(record(run_id, 2)).await.unwrap();

        let mut deliveries = queue.subscribe().await.unwrap();
        let first = deliveries.next().await.unwrap().unwrap();
        assert_eq!(first.message().sequence, Some(1));
        assert_eq!(first.delivery_count(), 1);
        first.ack().await.unwrap();

        let second = deliveries.next().await.unwrap().unwrap();
        assert_eq!(second.message().sequence, Some(2));
        second.ack().await.unwrap();

        let stats = queue.stats();
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.acked, 2);
        assert_eq!(stats.settled(), stats.delivered);
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_incremented_count() {
        let queue = MemoryQueue::new();
        queue.enqueue(record(Uuid::now_v7(), 1)).await.unwrap();

        let mut deliveries = queue.subscribe().await.unwrap();
        let first = deliveries.next().await.unwrap().unwrap();
        first.nack().await.unwrap();

        let again = deliveries.next().await.unwrap().unwrap();
        assert_eq!(again.message().sequence, Some(1));
        assert_eq!(again.delivery_count(), 2);
        again.term().await.unwrap();

        let stats = queue.stats();
        assert_eq!(stats.nacked, 1);
        assert_eq!(stats.terminated, 1);
        assert_eq!(stats.abandoned, 0);
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_redelivered() {
        let queue = MemoryQueue::new();
        queue.enqueue(record(Uuid::now_v7(), 1)).await.unwrap();

        let mut deliveries = queue.subscribe().await.unwrap();
        drop(deliveries.next().await.unwrap().unwrap());

        let again = deliveries.next().await.unwrap().unwrap();
        assert_eq!(again.delivery_count(), 2);
        again.ack().await.unwrap();
        assert_eq!(queue.stats().abandoned, 1);
    }

    #[tokio::test]
    async fn test_single_subscriber() {
        let queue = MemoryQueue::new();
        let _deliveries = queue.subscribe().await.unwrap();
        assert!(matches!(queue.subscribe().await, Err(Error::Subscribe(_))));
    }

    #[tokio::test]
    async fn test_enqueue_limit() {
        let queue = MemoryQueue::with_enqueue_limit(1);
        let run_id = Uuid::now_v7();
        queue.enqueue(record(run_id, 1)).await.unwrap();
        assert!(matches!(
            queue.enqueue(record(run_id, 2)).await,
            Err(Error::Publish(_))
        ));
        assert_eq!(queue.enqueued().len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letters_are_kept() {
        let queue = MemoryQueue::new();
        let message = Message::end_of_stream(Uuid::now_v7(), 1, 0).unwrap();
        queue
            .dead_letter(DeadLetter::new(message, "bad", 3))
            .await
            .unwrap();

        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message.kind, MessageKind::EndOfStream);
        assert_eq!(dead[0].delivery_count, 3);
    }
}
