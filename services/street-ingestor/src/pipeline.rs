use crate::city::City;
use crate::completion::{self, PublishReport};
use crate::consumer::{Consumer, ConsumerReport};
use crate::errors::{IngestError, Result};
use crate::producer::Producer;
use crate::sink::DocumentSink;
use crate::source::StreetSource;
use message_bus::QueueChannel;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub published: PublishReport,
    pub consumed: ConsumerReport,
}

/// Run the producer and consumer for one city until the consumer is done.
///
/// The consumer runs on its own task while the producer publishes. A producer
/// failure aborts the consumer and fails the run with the producer's error.
pub async fn run_pipeline(
    source: Arc<dyn StreetSource>,
    queue: Arc<dyn QueueChannel>,
    sink: Arc<dyn DocumentSink>,
    city: City,
    max_deliveries: u64,
) -> Result<PipelineReport> {
    let run_id = Uuid::now_v7();
    info!("Starting run {} for {}", run_id, city);

    let (notifier, watch) = completion::channel();
    let consumer = Consumer::new(Arc::clone(&queue), sink, run_id, max_deliveries);
    let mut consumer_task = tokio::spawn(consumer.run(watch));

    let producer = Producer::new(source, queue, run_id);
    let publishing = producer.run(city, notifier);
    tokio::pin!(publishing);

    let (published, consumed) = tokio::select! {
        published = &mut publishing => match published {
            Ok(report) => (report, join_consumer(&mut consumer_task).await?),
            Err(e) => {
                consumer_task.abort();
                return Err(e);
            }
        },
        consumed = &mut consumer_task => match flatten(consumed) {
            // Marker settled before the producer future returned
            Ok(consumed) => (publishing.await?, consumed),
            Err(IngestError::ProducerAborted) => {
                publishing.await?;
                return Err(IngestError::ProducerAborted);
            }
            Err(e) => return Err(e),
        }
    };

    Ok(PipelineReport {
        published,
        consumed,
    })
}

async fn join_consumer(task: &mut tokio::task::JoinHandle<Result<ConsumerReport>>) -> Result<ConsumerReport> {
    flatten(task.await)
}

fn flatten(joined: std::result::Result<Result<ConsumerReport>, tokio::task::JoinError>) -> Result<ConsumerReport> {
    joined.map_err(|e| {
        error!("Consumer task failed: {}", e);
        IngestError::Internal(e.to_string())
    })?
}
