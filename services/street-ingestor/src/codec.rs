//! Street record wire codec
//!
//! The payload is the bare JSON object of a [`StreetDetail`]; anything that
//! is not exactly that shape is rejected as [`IngestError::MalformedPayload`].

use crate::errors::{IngestError, Result};
use crate::models::StreetDetail;
use bytes::Bytes;

pub fn encode(detail: &StreetDetail) -> Result<Bytes> {
    serde_json::to_vec(detail)
        .map(Bytes::from)
        .map_err(|e| IngestError::MalformedPayload(format!("Serialization error: {}", e)))
}

pub fn decode(payload: &[u8]) -> Result<StreetDetail> {
    serde_json::from_slice(payload).map_err(|e| IngestError::MalformedPayload(e.to_string()))
}
