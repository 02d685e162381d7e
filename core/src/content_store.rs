//! Content store trait: descriptive payloads fetched by content hash.
//!
//! Titles, images and descriptions never live on the ledger. A metadata
//! announcement log carries a content hash; the payload behind it is fetched
//! from an off-chain store. Fetches are slow and may never answer, so every
//! call carries its own timeout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a content fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentStoreError {
    /// No payload is stored under this hash.
    #[error("Content not found: {0}")]
    NotFound(ContentHash),

    /// The store did not answer within the allowed time.
    #[error("Content fetch for {hash} timed out after {timeout:?}")]
    Timeout {
        /// Hash that was requested.
        hash: ContentHash,
        /// Time budget that elapsed.
        timeout: Duration,
    },

    /// Any other backend failure.
    #[error("Content store error: {0}")]
    Backend(String),
}

/// Identifier of a payload in the content store.
///
/// Rendered as lowercase hex of the multihash bytes
/// (`hash function code`, `digest size`, `digest`).
///
/// # Examples
///
/// ```
/// use ticketsync_core::content_store::ContentHash;
///
/// let hash = ContentHash::new("1220ab");
/// assert_eq!(hash.as_str(), "1220ab");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new `ContentHash`.
    #[must_use]
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Get the hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Read-only, hash-addressed payload store.
///
/// # Dyn Compatibility
///
/// Returns `Pin<Box<dyn Future>>` so reducers can capture an
/// `Arc<dyn ContentStore>` inside a `'static` effect.
pub trait ContentStore: Send + Sync {
    /// Fetch the payload stored under `hash`.
    ///
    /// Implementations must give up once `timeout` has elapsed and return
    /// [`ContentStoreError::Timeout`].
    ///
    /// # Errors
    ///
    /// - `NotFound`: nothing is stored under the hash
    /// - `Timeout`: no answer within `timeout`
    /// - `Backend`: any other failure
    fn fetch(
        &self,
        hash: &ContentHash,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ContentStoreError>> + Send + '_>>;
}
