use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Street not found in catalog: {0}")]
    StreetNotFound(u64),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Message bus error: {0}")]
    Bus(#[from] message_bus::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid city: {0}")]
    InvalidCity(String),

    #[error("Producer aborted before publishing finished")]
    ProducerAborted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for IngestError {
    fn from(e: config::ConfigError) -> Self {
        IngestError::Config(e.to_string())
    }
}
