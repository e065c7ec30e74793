//! Message envelope for the work queue

use crate::types::{header, MessageKind};
use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of an end-of-stream marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct EndOfStreamBody {
    published: u64,
}

/// Message envelope
///
/// Run metadata travels in headers. A message published by something other
/// than this crate has no run id or sequence and is treated as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message kind
    pub kind: MessageKind,

    /// Run that published this message
    pub run_id: Option<Uuid>,

    /// Position within the run (1-based)
    pub sequence: Option<u64>,

    /// Payload, passed through verbatim
    pub payload: Bytes,
}

impl Message {
    /// Create a record message
    pub fn record(run_id: Uuid, sequence: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Record,
            run_id: Some(run_id),
            sequence: Some(sequence),
            payload: payload.into(),
        }
    }

    /// Create the end-of-stream marker closing a run of `published` records
    pub fn end_of_stream(run_id: Uuid, sequence: u64, published: u64) -> Result<Self> {
        let payload = serde_json::to_vec(&EndOfStreamBody { published })?;
        Ok(Self {
            kind: MessageKind::EndOfStream,
            run_id: Some(run_id),
            sequence: Some(sequence),
            payload: payload.into(),
        })
    }

    /// Number of records announced by an end-of-stream marker
    pub fn published_count(&self) -> Result<u64> {
        if self.kind != MessageKind::EndOfStream {
            return Err(Error::MalformedMessage(format!(
                "{} message carries no published count",
                self.kind
            )));
        }
        let body: EndOfStreamBody = serde_json::from_slice(&self.payload)
            .map_err(|e| Error::MalformedMessage(format!("end-of-stream body: {}", e)))?;
        Ok(body.published)
    }

    /// Whether this message was published by the given run
    pub fn belongs_to(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }

    /// Broker deduplication id (`{run_id}-{sequence}`)
    pub fn message_id(&self) -> Option<String> {
        match (self.run_id, self.sequence) {
            (Some(run_id), Some(sequence)) => Some(format!("{}-{}", run_id, sequence)),
            _ => None,
        }
    }

    /// Headers to publish with this message
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(header::KIND, self.kind.as_str().to_string())];
        if let Some(run_id) = self.run_id {
            headers.push((header::RUN_ID, run_id.to_string()));
        }
        if let Some(sequence) = self.sequence {
            headers.push((header::SEQUENCE, sequence.to_string()));
        }
        headers
    }

    /// Rebuild a message from received headers and payload
    ///
    /// Unknown or unparseable header values fall back to a foreign record.
    pub fn from_headers<F>(lookup: F, payload: Bytes) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = lookup(header::KIND)
            .and_then(|value| MessageKind::from_header(&value))
            .unwrap_or(MessageKind::Record);
        let run_id = lookup(header::RUN_ID).and_then(|value| Uuid::parse_str(value.trim()).ok());
        let sequence = lookup(header::SEQUENCE).and_then(|value| value.trim().parse().ok());

        Self {
            kind,
            run_id,
            sequence,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(headers: Vec<(&'static str, String)>) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = headers
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_record_headers_survive_transport() {
        let run_id = Uuid::now_v7();
        let msg = Message::record(run_id, 7, &b"{\"streetId\":1}"[..]);

        let received = Message::from_headers(lookup_in(msg.headers()), msg.payload.clone());

        assert_eq!(received, msg);
        assert!(received.belongs_to(run_id));
        assert_eq!(received.message_id(), Some(format!("{}-7", run_id)));
    }

    #[test]
    fn test_end_of_stream_count() {
        let msg = Message::end_of_stream(Uuid::now_v7(), 4, 3).unwrap();
        assert_eq!(msg.kind, MessageKind::EndOfStream);
        assert_eq!(msg.published_count().unwrap(), 3);

        let record = Message::record(Uuid::now_v7(), 1, Bytes::new());
        assert!(record.published_count().is_err());
    }

    #[test]
    fn test_headerless_message_is_foreign_record() {
        let received = Message::from_headers(|_| None, Bytes::from_static(b"{}"));

        assert_eq!(received.kind, MessageKind::Record);
        assert_eq!(received.run_id, None);
        assert_eq!(received.message_id(), None);
        assert!(!received.belongs_to(Uuid::now_v7()));
    }

    #[test]
    fn test_garbage_headers_are_ignored() {
        let received = Message::from_headers(
            lookup_in(vec![
                (header::KIND, "bogus".to_string()),
                (header::RUN_ID, "not-a-uuid".to_string()),
                (header::SEQUENCE, "-1".to_string()),
            ]),
            Bytes::new(),
        );

        assert_eq!(received.kind, MessageKind::Record);
        assert_eq!(received.run_id, None);
        assert_eq!(received.sequence, None);
    }
}
