//! Snapshot store trait: an opaque key-value cache between sessions.
//!
//! Aggregates serialize themselves; the store only keeps bytes alongside the
//! block checkpoint they were taken at, so a restored aggregate resumes
//! replay from the right place without re-running discovery.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Type alias for snapshot data: `(checkpoint block, bytes)`
pub type SnapshotData = (u64, Vec<u8>);

/// Errors that can occur during snapshot operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Backend read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Key-value store for aggregate snapshots.
///
/// # Dyn Compatibility
///
/// Explicit `Pin<Box<dyn Future>>` returns keep the trait usable as
/// `Arc<dyn SnapshotStore>`.
pub trait SnapshotStore: Send + Sync {
    /// Save (or overwrite) the snapshot under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the write fails.
    fn save_snapshot(
        &self,
        key: String,
        checkpoint: u64,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + '_>>;

    /// Load the snapshot under `key`, or `None` if nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the read fails.
    fn load_snapshot(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SnapshotData>, SnapshotError>> + Send + '_>>;
}
