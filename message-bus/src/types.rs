//! Type definitions for message bus

use serde::{Deserialize, Serialize};

/// Header names carried alongside every payload.
///
/// The payload itself is left untouched so independent producers and
/// consumers only have to agree on the body format.
pub mod header {
    /// Kind of message, see [`super::MessageKind`]
    pub const KIND: &str = "Bus-Message-Kind";
    /// Identifier of the publishing run
    pub const RUN_ID: &str = "Bus-Run-Id";
    /// 1-based position of the message within its run
    pub const SEQUENCE: &str = "Bus-Sequence";
    /// Why a message was dead-lettered
    pub const FAILURE_REASON: &str = "Bus-Failure-Reason";
    /// How many times a message was delivered before being dead-lettered
    pub const DELIVERY_COUNT: &str = "Bus-Delivery-Count";
    /// When a message was dead-lettered (RFC 3339)
    pub const FAILED_AT: &str = "Bus-Failed-At";
    /// JetStream deduplication id
    pub const NATS_MSG_ID: &str = "Nats-Msg-Id";
}

/// Message kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// A data record
    Record,
    /// Last message of a run, carries the number of records published
    EndOfStream,
}

impl MessageKind {
    /// Header value for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Record => "record",
            MessageKind::EndOfStream => "end-of-stream",
        }
    }

    /// Parse a header value
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim() {
            "record" => Some(MessageKind::Record),
            "end-of-stream" => Some(MessageKind::EndOfStream),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_header_values() {
        assert_eq!(MessageKind::Record.as_str(), "record");
        assert_eq!(
            MessageKind::from_header("end-of-stream"),
            Some(MessageKind::EndOfStream)
        );
        assert_eq!(MessageKind::from_header(" record "), Some(MessageKind::Record));
        assert_eq!(MessageKind::from_header("heartbeat"), None);
    }
}
