//! Error types for message bus

use thiserror::Error;

/// Message bus error
#[derive(Debug, Error)]
pub enum Error {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Stream creation error
    #[error("Stream creation error: {0}")]
    StreamCreation(String),

    /// Consumer creation error
    #[error("Consumer creation error: {0}")]
    ConsumerCreation(String),

    /// Publish error
    #[error("Publish error: {0}")]
    Publish(String),

    /// Subscribe error
    #[error("Subscribe error: {0}")]
    Subscribe(String),

    /// Ack / nak / term could not be delivered to the broker
    #[error("Acknowledgement error: {0}")]
    Acknowledge(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Message does not carry what its kind requires
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
