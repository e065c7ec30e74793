//! Dead-letter entries
//!
//! A message that cannot be processed is republished to a dead-letter
//! destination with its original payload and:
//! - Failure reason
//! - Delivery count at the time it was given up on
//! - Failure timestamp

use chrono::{DateTime, Utc};

use crate::{message::Message, types::header};

/// Dead-letter entry with failure metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Message as it was delivered
    pub message: Message,
    /// Why processing gave up
    pub reason: String,
    /// Deliveries attempted
    pub delivery_count: u64,
    /// When it was dead-lettered
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    /// Create new entry
    pub fn new(message: Message, reason: impl Into<String>, delivery_count: u64) -> Self {
        Self {
            message,
            reason: reason.into(),
            delivery_count,
            failed_at: Utc::now(),
        }
    }

    /// Original headers plus failure metadata
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = self.message.headers();
        headers.push((header::FAILURE_REASON, sanitize_header_value(&self.reason)));
        headers.push((header::DELIVERY_COUNT, self.delivery_count.to_string()));
        headers.push((header::FAILED_AT, self.failed_at.to_rfc3339()));
        headers
    }
}

/// Header values must stay on one line
fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}
