//! JetStream publisher

use crate::{
    client::NatsClient,
    dead_letter::DeadLetter,
    message::Message,
    metrics::{DEAD_LETTER_TOTAL, MESSAGE_PUBLISH_DURATION, MESSAGE_PUBLISH_TOTAL},
    types::header,
    Error, Result,
};
use async_nats::HeaderMap;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Publishes queue and dead-letter messages and waits for the stream ack
#[derive(Clone)]
pub struct Publisher {
    client: NatsClient,
    queue: String,
    subject: String,
    dead_letter_subject: String,
}

impl Publisher {
    /// Create new publisher
    pub fn new(
        client: NatsClient,
        queue: impl Into<String>,
        subject: impl Into<String>,
        dead_letter_subject: impl Into<String>,
    ) -> Self {
        Self {
            client,
            queue: queue.into(),
            subject: subject.into(),
            dead_letter_subject: dead_letter_subject.into(),
        }
    }

    /// Publish a message to the queue subject
    pub async fn publish(&self, message: &Message) -> Result<()> {
        let start = Instant::now();

        let mut headers = header_map(message.headers());
        if let Some(id) = message.message_id() {
            headers.insert(header::NATS_MSG_ID, id.as_str());
        }

        let result = self
            .publish_acked(self.subject.clone(), headers, message)
            .await;

        MESSAGE_PUBLISH_DURATION
            .with_label_values(&[self.queue.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let status = if result.is_ok() { "success" } else { "error" };
        MESSAGE_PUBLISH_TOTAL
            .with_label_values(&[self.queue.as_str(), status])
            .inc();

        match &result {
            Ok(()) => debug!(
                "Published {} message {:?} to {}",
                message.kind, message.sequence, self.subject
            ),
            Err(e) => error!("Failed to publish to {}: {}", self.subject, e),
        }

        result
    }

    /// Publish a dead-letter entry
    pub async fn publish_dead_letter(&self, dead_letter: &DeadLetter) -> Result<()> {
        let headers = header_map(dead_letter.headers());

        let result = self
            .publish_acked(self.dead_letter_subject.clone(), headers, &dead_letter.message)
            .await;

        let status = if result.is_ok() { "success" } else { "error" };
        DEAD_LETTER_TOTAL
            .with_label_values(&[self.queue.as_str(), status])
            .inc();

        if result.is_ok() {
            warn!(
                "Message {:?} moved to {} after {} deliveries: {}",
                dead_letter.message.sequence,
                self.dead_letter_subject,
                dead_letter.delivery_count,
                dead_letter.reason
            );
        }

        result
    }

    async fn publish_acked(&self, subject: String, headers: HeaderMap, message: &Message) -> Result<()> {
        let ack = self
            .client
            .jetstream()
            .publish_with_headers(subject, headers, message.payload.clone())
            .await
            .map_err(|e| Error::Publish(e.to_string()))?;

        // Wait for the stream to persist it
        ack.await
            .map_err(|e| Error::Publish(format!("Publish ack failed: {}", e)))?;

        Ok(())
    }
}

fn header_map(pairs: Vec<(&'static str, String)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(name, value.as_str());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_header_map_contains_run_metadata() {
        let run_id = Uuid::now_v7();
        let message = Message::record(run_id, 3, &b"{}"[..]);

        let headers = header_map(message.headers());

        assert_eq!(
            headers.get(header::RUN_ID).map(|v| v.as_str().to_string()),
            Some(run_id.to_string())
        );
        assert_eq!(
            headers.get(header::SEQUENCE).map(|v| v.as_str().to_string()),
            Some("3".to_string())
        );
    }
}
