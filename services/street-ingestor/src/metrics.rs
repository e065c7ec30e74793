use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram, CounterVec, Histogram};

lazy_static! {
    pub static ref STREETS_PUBLISHED_TOTAL: CounterVec = register_counter_vec!(
        "street_ingestor_published_total",
        "Street records enqueued by the producer",
        &["city"]
    )
    .unwrap();

    pub static ref DELIVERY_OUTCOME_TOTAL: CounterVec = register_counter_vec!(
        "street_ingestor_delivery_outcome_total",
        "Consumer deliveries by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref INSERT_DURATION: Histogram = register_histogram!(
        "street_ingestor_insert_duration_seconds",
        "Document insert duration in seconds"
    )
    .unwrap();
}
