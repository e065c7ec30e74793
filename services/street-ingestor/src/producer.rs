use crate::city::City;
use crate::codec;
use crate::completion::{CompletionNotifier, PublishReport};
use crate::errors::Result;
use crate::metrics::STREETS_PUBLISHED_TOTAL;
use crate::source::StreetSource;
use message_bus::{Message, QueueChannel};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Publishes one message per street of a city, then an end-of-stream marker
pub struct Producer {
    source: Arc<dyn StreetSource>,
    queue: Arc<dyn QueueChannel>,
    run_id: Uuid,
}

impl Producer {
    pub fn new(source: Arc<dyn StreetSource>, queue: Arc<dyn QueueChannel>, run_id: Uuid) -> Self {
        Self {
            source,
            queue,
            run_id,
        }
    }

    /// Any lookup or enqueue failure aborts the run and drops `notifier`
    /// unfired; completion is only signalled after the marker is enqueued.
    pub async fn run(&self, city: City, notifier: CompletionNotifier) -> Result<PublishReport> {
        let result = self.publish(city).await;

        match result {
            Ok(report) => {
                notifier.notify(report);
                info!("Publish finished: {} streets of {}", report.published, city);
                Ok(report)
            }
            Err(e) => {
                error!("Publish of {} aborted: {}", city, e);
                Err(e)
            }
        }
    }

    async fn publish(&self, city: City) -> Result<PublishReport> {
        let streets = self.source.list_streets(city).await?;
        info!("Publishing {} streets of {} (run {})", streets.len(), city, self.run_id);

        let mut sequence = 0u64;
        for street in streets {
            let detail = self.source.get_detail(street.street_id).await?;
            let payload = codec::encode(&detail)?;

            sequence += 1;
            self.queue
                .enqueue(Message::record(self.run_id, sequence, payload))
                .await?;

            STREETS_PUBLISHED_TOTAL.with_label_values(&[city.key()]).inc();
            info!(
                "Message sent to queue: street {} ({}) seq {}",
                detail.street_id, detail.street_name, sequence
            );
        }

        self.queue
            .enqueue(Message::end_of_stream(self.run_id, sequence + 1, sequence)?)
            .await?;

        Ok(PublishReport {
            run_id: self.run_id,
            published: sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion;
    use crate::errors::IngestError;
    use crate::models::{StreetDetail, StreetSummary};
    use crate::source::MockStreetSource;
    use message_bus::{MemoryQueue, MessageKind};
    use mockall::predicate::eq;

    fn detail(street_id: u64) -> StreetDetail {
        StreetDetail {
            street_id,
            region_code: 5,
            region_name: "תל אביב".to_string(),
            city_code: 5000,
            city_name: "תל אביב - יפו".to_string(),
            street_code: street_id as u32,
            street_name: format!("street {}", street_id),
            street_name_status: None,
            official_code: Some(street_id),
        }
    }

    fn source_with(ids: Vec<u64>) -> MockStreetSource {
        let mut source = MockStreetSource::new();
        let listing: Vec<StreetSummary> = ids
            .iter()
            .map(|&street_id| StreetSummary { street_id })
            .collect();
        source
            .expect_list_streets()
            .with(eq(City::TelAviv))
            .times(1)
            .returning(move |_| Ok(listing.clone()));
        source
            .expect_get_detail()
            .returning(|street_id| Ok(detail(street_id)));
        source
    }

    #[tokio::test]
    async fn test_enqueues_in_listing_order_then_marker() {
        let queue = Arc::new(MemoryQueue::new());
        let run_id = Uuid::now_v7();
        let producer = Producer::new(Arc::new(source_with(vec![30, 10, 20])), queue.clone(), run_id);
        let (notifier, mut watch) = completion::channel();

        let report = producer.run(City::TelAviv, notifier).await.unwrap();
        assert_eq!(report.published, 3);

        let enqueued = queue.enqueued();
        assert_eq!(enqueued.len(), 4);

        let ids: Vec<u64> = enqueued[..3]
            .iter()
            .map(|m| codec::decode(&m.payload).unwrap().street_id)
            .collect();
        assert_eq!(ids, vec![30, 10, 20]);
        assert_eq!(
            enqueued.iter().map(|m| m.sequence).collect::<Vec<_>>(),
            vec![Some(1), Some(2), Some(3), Some(4)]
        );

        let marker = &enqueued[3];
        assert_eq!(marker.kind, MessageKind::EndOfStream);
        assert_eq!(marker.published_count().unwrap(), 3);
        assert!(enqueued.iter().all(|m| m.belongs_to(run_id)));

        // Signal only fires after every enqueue returned
        assert_eq!(watch.wait().await, Some(report));
    }

    #[tokio::test]
    async fn test_empty_catalog_signals_completion_immediately() {
        let queue = Arc::new(MemoryQueue::new());
        let producer = Producer::new(Arc::new(source_with(vec![])), queue.clone(), Uuid::now_v7());
        let (notifier, mut watch) = completion::channel();

        producer.run(City::TelAviv, notifier).await.unwrap();

        let enqueued = queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].published_count().unwrap(), 0);
        assert_eq!(watch.wait().await.map(|r| r.published), Some(0));
    }

    #[tokio::test]
    async fn test_detail_failure_aborts_without_signal() {
        let mut source = MockStreetSource::new();
        source
            .expect_list_streets()
            .returning(|_| Ok(vec![StreetSummary { street_id: 1 }, StreetSummary { street_id: 2 }]));
        source.expect_get_detail().with(eq(1)).returning(|id| Ok(detail(id)));
        source
            .expect_get_detail()
            .with(eq(2))
            .returning(|_| Err(IngestError::SourceUnavailable("timeout".to_string())));

        let queue = Arc::new(MemoryQueue::new());
        let producer = Producer::new(Arc::new(source), queue.clone(), Uuid::now_v7());
        let (notifier, mut watch) = completion::channel();

        let result = producer.run(City::TelAviv, notifier).await;
        assert!(matches!(result, Err(IngestError::SourceUnavailable(_))));

        // One record out, no marker, no completion
        assert_eq!(queue.enqueued().len(), 1);
        assert_eq!(watch.wait().await, None);
    }

    #[tokio::test]
    async fn test_listing_failure_publishes_nothing() {
        let mut source = MockStreetSource::new();
        source
            .expect_list_streets()
            .returning(|_| Err(IngestError::SourceUnavailable("connection refused".to_string())));
        source.expect_get_detail().never();

        let queue = Arc::new(MemoryQueue::new());
        let producer = Producer::new(Arc::new(source), queue.clone(), Uuid::now_v7());
        let (notifier, _watch) = completion::channel();

        assert!(producer.run(City::TelAviv, notifier).await.is_err());
        assert!(queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_failure_aborts_without_signal() {
        let queue = Arc::new(MemoryQueue::with_enqueue_limit(2));
        let producer = Producer::new(Arc::new(source_with(vec![1, 2, 3])), queue.clone(), Uuid::now_v7());
        let (notifier, mut watch) = completion::channel();

        let result = producer.run(City::TelAviv, notifier).await;
        assert!(matches!(result, Err(IngestError::Bus(_))));
        assert_eq!(queue.enqueued().len(), 2);
        assert_eq!(watch.wait().await, None);
    }
}
