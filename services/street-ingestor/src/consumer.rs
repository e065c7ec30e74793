//! Queue consumer
//!
//! Persists every delivered street record and settles each delivery exactly
//! once. The run is done when publishing has finished, this run's
//! end-of-stream marker has been received, and every record of the run has
//! been acked or dead-lettered.

use crate::codec;
use crate::completion::CompletionWatch;
use crate::errors::{IngestError, Result};
use crate::metrics::{DELIVERY_OUTCOME_TOTAL, INSERT_DURATION};
use crate::sink::DocumentSink;
use futures::StreamExt;
use message_bus::{DeadLetter, Delivery, MessageKind, QueueChannel};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Publishing still in progress
    Waiting,
    /// Publishing finished, backlog still being handled
    Draining,
    Done,
}

/// Delivery totals for one consumer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub inserted: u64,
    pub nacked: u64,
    pub dead_lettered: u64,
    /// Records handled that were not published by this run
    pub foreign: u64,
}

/// Completion bookkeeping for the current run
#[derive(Debug)]
struct RunProgress {
    run_id: Uuid,
    expected: Option<u64>,
    marker_seen: bool,
    settled: HashSet<u64>,
}

impl RunProgress {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            expected: None,
            marker_seen: false,
            settled: HashSet::new(),
        }
    }

    fn publishing_done(&mut self, published: u64) {
        match self.expected {
            Some(expected) if expected != published => {
                warn!(
                    "Run {} announced {} records, previously {}",
                    self.run_id, published, expected
                );
            }
            _ => {}
        }
        self.expected = Some(published);
    }

    fn marker_received(&mut self, published: u64) {
        self.publishing_done(published);
        self.marker_seen = true;
    }

    fn settle(&mut self, sequence: u64) {
        self.settled.insert(sequence);
    }

    fn state(&self) -> ConsumerState {
        match self.expected {
            None => ConsumerState::Waiting,
            Some(expected) if self.marker_seen && self.settled.len() as u64 >= expected => {
                ConsumerState::Done
            }
            Some(_) => ConsumerState::Draining,
        }
    }
}

pub struct Consumer {
    queue: Arc<dyn QueueChannel>,
    sink: Arc<dyn DocumentSink>,
    run_id: Uuid,
    max_deliveries: u64,
}

impl Consumer {
    pub fn new(
        queue: Arc<dyn QueueChannel>,
        sink: Arc<dyn DocumentSink>,
        run_id: Uuid,
        max_deliveries: u64,
    ) -> Self {
        Self {
            queue,
            sink,
            run_id,
            max_deliveries: max_deliveries.max(1),
        }
    }

    /// Consume until the run reaches [`ConsumerState::Done`]
    ///
    /// Fails if the subscription cannot be opened, the delivery stream ends,
    /// this run's end-of-stream marker is unreadable, or the producer drops
    /// its notifier without finishing.
    pub async fn run(self, mut completion: CompletionWatch) -> Result<ConsumerReport> {
        let mut deliveries = self.queue.subscribe().await?;
        info!("Consumer subscribed (run {})", self.run_id);

        let mut progress = RunProgress::new(self.run_id);
        let mut report = ConsumerReport::default();
        let mut state = ConsumerState::Waiting;
        let mut watching = true;

        loop {
            tokio::select! {
                signal = completion.wait(), if watching => {
                    watching = false;
                    match signal {
                        Some(published) if published.run_id == self.run_id => {
                            progress.publishing_done(published.published);
                        }
                        Some(published) => {
                            warn!("Ignoring completion signal for run {}", published.run_id);
                        }
                        None => {
                            error!("Producer stopped before publishing finished");
                            return Err(IngestError::ProducerAborted);
                        }
                    }
                }
                next = deliveries.next() => {
                    match next {
                        Some(Ok(delivery)) => self.handle(delivery, &mut progress, &mut report).await?,
                        Some(Err(e)) => warn!("Error receiving delivery: {}", e),
                        None => {
                            error!("Delivery stream closed (run {})", self.run_id);
                            return Err(IngestError::Bus(message_bus::Error::Subscribe(
                                "delivery stream closed".to_string(),
                            )));
                        }
                    }
                }
            }

            let next_state = progress.state();
            if next_state != state {
                info!("Consumer state {:?} -> {:?}", state, next_state);
                state = next_state;
            }

            if state == ConsumerState::Done {
                info!(
                    "Finished successfully: {} inserted, {} nacked, {} dead-lettered, {} foreign",
                    report.inserted, report.nacked, report.dead_lettered, report.foreign
                );
                return Ok(report);
            }
        }
    }

    async fn handle(
        &self,
        delivery: Delivery,
        progress: &mut RunProgress,
        report: &mut ConsumerReport,
    ) -> Result<()> {
        let message = delivery.message();
        let own_run = message.belongs_to(self.run_id);
        let sequence = message.sequence;

        if message.kind == MessageKind::EndOfStream {
            return self.handle_marker(delivery, own_run, progress, report).await;
        }

        if !own_run {
            report.foreign += 1;
            debug!("Record from outside run {} (run {:?})", self.run_id, message.run_id);
        }

        // Settled sequences only count toward this run's completion
        let settled = self.handle_record(delivery, report).await;
        if let (true, true, Some(sequence)) = (settled, own_run, sequence) {
            progress.settle(sequence);
        }
        Ok(())
    }

    async fn handle_marker(
        &self,
        delivery: Delivery,
        own_run: bool,
        progress: &mut RunProgress,
        report: &mut ConsumerReport,
    ) -> Result<()> {
        if !own_run {
            info!(
                "Ignoring end-of-stream marker of run {:?}",
                delivery.message().run_id
            );
            if let Err(e) = delivery.ack().await {
                warn!("Failed to ack stale marker: {}", e);
            }
            return Ok(());
        }

        let published = delivery.message().published_count();
        match published {
            Ok(published) => {
                if let Err(e) = delivery.ack().await {
                    warn!("Failed to ack end-of-stream marker: {}", e);
                }
                info!("End-of-stream marker received: {} records published", published);
                progress.marker_received(published);
                Ok(())
            }
            Err(e) => {
                // Only this process writes the marker, the run cannot finish without it
                error!("Malformed end-of-stream marker: {}", e);
                self.give_up(delivery, e.to_string(), report).await;
                Err(IngestError::MalformedPayload(format!(
                    "end-of-stream marker of run {}: {}",
                    self.run_id, e
                )))
            }
        }
    }

    /// Returns true once the delivery is acked or dead-lettered
    async fn handle_record(&self, delivery: Delivery, report: &mut ConsumerReport) -> bool {
        let decoded = codec::decode(&delivery.message().payload);
        let detail = match decoded {
            Ok(detail) => detail,
            Err(e) => {
                error!("Error decoding delivery: {}", e);
                DELIVERY_OUTCOME_TOTAL.with_label_values(&["malformed"]).inc();
                return self.give_up(delivery, e.to_string(), report).await;
            }
        };

        let timer = INSERT_DURATION.start_timer();
        let inserted = self.sink.insert_one(&detail).await;
        timer.observe_duration();

        match inserted {
            Ok(()) => {
                info!("Inserted {} in {}", detail.street_name, detail.city_name);
                report.inserted += 1;
                DELIVERY_OUTCOME_TOTAL.with_label_values(&["acked"]).inc();
                if let Err(e) = delivery.ack().await {
                    // Redelivery would only insert a duplicate
                    warn!("Failed to ack street {}: {}", detail.street_id, e);
                }
                true
            }
            Err(e) if delivery.delivery_count() >= self.max_deliveries => {
                error!(
                    "Giving up on street {} after {} deliveries: {}",
                    detail.street_id,
                    delivery.delivery_count(),
                    e
                );
                self.give_up(delivery, e.to_string(), report).await
            }
            Err(e) => {
                warn!(
                    "Error inserting street {} (delivery {}): {}",
                    detail.street_id,
                    delivery.delivery_count(),
                    e
                );
                report.nacked += 1;
                DELIVERY_OUTCOME_TOTAL.with_label_values(&["nacked"]).inc();
                if let Err(e) = delivery.nack().await {
                    warn!("Failed to nack street {}: {}", detail.street_id, e);
                }
                false
            }
        }
    }

    /// Dead-letter then terminate. If the dead-letter publish fails the
    /// delivery is nacked instead and false is returned.
    async fn give_up(&self, delivery: Delivery, reason: String, report: &mut ConsumerReport) -> bool {
        let dead_letter = DeadLetter::new(
            delivery.message().clone(),
            reason,
            delivery.delivery_count(),
        );

        match self.queue.dead_letter(dead_letter).await {
            Ok(()) => {
                report.dead_lettered += 1;
                DELIVERY_OUTCOME_TOTAL.with_label_values(&["dead_lettered"]).inc();
                if let Err(e) = delivery.term().await {
                    warn!("Failed to terminate dead-lettered delivery: {}", e);
                }
                true
            }
            Err(e) => {
                error!("Dead-letter publish failed, requeueing: {}", e);
                report.nacked += 1;
                DELIVERY_OUTCOME_TOTAL.with_label_values(&["nacked"]).inc();
                if let Err(e) = delivery.nack().await {
                    warn!("Failed to nack delivery: {}", e);
                }
                false
            }
        }
    }
}
