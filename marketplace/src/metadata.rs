//! Descriptive metadata: content hashes and payloads.
//!
//! Metadata announcement logs carry the multihash of a payload split into
//! three fields (`hashFunction`, `size`, `digest`). [`content_hash`] joins
//! them back into a [`ContentHash`]; the payload fetched under that hash is a
//! JSON document with a top-level `event` or `ticket` object.

use alloy_primitives::hex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use ticketsync_core::content_store::ContentHash;

/// Errors while recovering a hash or parsing a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Multihash parts are inconsistent.
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// The payload is not the expected JSON document.
    #[error("Invalid metadata payload: {0}")]
    InvalidPayload(String),
}

/// Rebuild a content hash from its announced multihash parts.
///
/// `digest` is a hex string with or without `0x`. Its length must equal
/// `size` bytes.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidHash`] if the digest is not hex or its
/// length disagrees with `size`.
///
/// # Examples
///
/// ```
/// use ticketsync_marketplace::metadata::content_hash;
///
/// let hash = content_hash(0x12, 2, "0xabcd").unwrap();
/// assert_eq!(hash.as_str(), "1202abcd");
/// ```
pub fn content_hash(hash_function: u8, size: u8, digest: &str) -> Result<ContentHash, MetadataError> {
    let digest = hex::decode(digest).map_err(|e| MetadataError::InvalidHash(e.to_string()))?;
    if digest.len() != usize::from(size) {
        return Err(MetadataError::InvalidHash(format!(
            "digest is {} bytes, announced size is {size}",
            digest.len()
        )));
    }
    let mut multihash = Vec::with_capacity(digest.len() + 2);
    multihash.push(hash_function);
    multihash.push(size);
    multihash.extend_from_slice(&digest);
    Ok(ContentHash::new(hex::encode(multihash)))
}

/// Descriptive data of a marketplace event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
    /// Event title.
    pub title: String,
    /// Venue or address.
    pub location: String,
    /// Free text description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Cover image reference.
    pub img_url: String,
    /// Human-readable duration.
    pub duration: String,
    /// Organizer's social handle.
    pub twitter: String,
    /// Organizer's website.
    pub url: String,
    /// Start time as unix seconds.
    #[serde(deserialize_with = "unix_seconds")]
    pub time: Option<i64>,
    /// Accent color.
    pub color: String,
}

impl EventMetadata {
    /// Start time, if the payload carried a valid one.
    #[must_use]
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.time.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Descriptive data of a ticket type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketMetadata {
    /// Ticket title.
    pub title: String,
    /// Free text description.
    pub description: String,
    /// Image reference.
    pub img_url: String,
    /// Accent color.
    pub color: String,
}

#[derive(Deserialize)]
struct EventEnvelope {
    event: EventMetadata,
}

#[derive(Deserialize)]
struct TicketEnvelope {
    ticket: TicketMetadata,
}

/// Parse an event payload (`{"event": {...}}`).
///
/// # Errors
///
/// Returns [`MetadataError::InvalidPayload`] if the bytes are not such a document.
pub fn parse_event_metadata(bytes: &[u8]) -> Result<EventMetadata, MetadataError> {
    serde_json::from_slice::<EventEnvelope>(bytes)
        .map(|envelope| envelope.event)
        .map_err(|e| MetadataError::InvalidPayload(e.to_string()))
}

/// Parse a ticket payload (`{"ticket": {...}}`).
///
/// # Errors
///
/// Returns [`MetadataError::InvalidPayload`] if the bytes are not such a document.
pub fn parse_ticket_metadata(bytes: &[u8]) -> Result<TicketMetadata, MetadataError> {
    serde_json::from_slice::<TicketEnvelope>(bytes)
        .map(|envelope| envelope.ticket)
        .map_err(|e| MetadataError::InvalidPayload(e.to_string()))
}

// Accepts a JSON number, a numeric string, or null.
fn unix_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(secs)) => Some(secs),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}
