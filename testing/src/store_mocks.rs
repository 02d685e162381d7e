//! In-memory content and snapshot stores
//!
//! - [`InMemoryContentStore`]: hash-addressed payloads, with hashes that can be
//!   made to stall until the caller's timeout elapses
//! - [`InMemorySnapshotStore`]: `HashMap`-based snapshot cache

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use ticketsync_core::content_store::{ContentHash, ContentStore, ContentStoreError};
use ticketsync_core::snapshot_store::{SnapshotData, SnapshotError, SnapshotStore};

#[derive(Debug, Default)]
struct ContentInner {
    payloads: HashMap<ContentHash, Vec<u8>>,
    stalled: HashSet<ContentHash>,
    fetched: Vec<ContentHash>,
}

/// In-memory content store for fast, deterministic testing.
///
/// # Example
///
/// ```
/// use ticketsync_testing::InMemoryContentStore;
/// use ticketsync_core::content_store::{ContentHash, ContentStore};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryContentStore::new();
/// let hash = ContentHash::new("1220ab");
/// store.insert(hash.clone(), br#"{"event":{}}"#.to_vec());
///
/// let bytes = store.fetch(&hash, Duration::from_millis(50)).await?;
/// assert!(!bytes.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryContentStore {
    inner: Arc<RwLock<ContentInner>>,
}

impl InMemoryContentStore {
    /// Create a new empty content store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload
    pub fn insert(&self, hash: ContentHash, bytes: Vec<u8>) {
        self.inner.write().unwrap().payloads.insert(hash, bytes);
    }

    /// Make fetches of `hash` hang until the caller's timeout
    pub fn stall(&self, hash: ContentHash) {
        self.inner.write().unwrap().stalled.insert(hash);
    }

    /// Let fetches of `hash` answer again
    pub fn unstall(&self, hash: &ContentHash) {
        self.inner.write().unwrap().stalled.remove(hash);
    }

    /// Hashes requested so far, in order
    #[must_use]
    pub fn fetched(&self) -> Vec<ContentHash> {
        self.inner.read().unwrap().fetched.clone()
    }
}

impl ContentStore for InMemoryContentStore {
    fn fetch(
        &self,
        hash: &ContentHash,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ContentStoreError>> + Send + '_>> {
        let hash = hash.clone();
        Box::pin(async move {
            let stalled = {
                let mut inner = self.inner.write().unwrap();
                inner.fetched.push(hash.clone());
                inner.stalled.contains(&hash)
            };
            if stalled {
                let _ = tokio::time::timeout(timeout, std::future::pending::<()>()).await;
                return Err(ContentStoreError::Timeout { hash, timeout });
            }
            self.inner
                .read()
                .unwrap()
                .payloads
                .get(&hash)
                .cloned()
                .ok_or(ContentStoreError::NotFound(hash))
        })
    }
}

/// In-memory snapshot store for testing session caching.
///
/// # Example
///
/// ```
/// use ticketsync_testing::InMemorySnapshotStore;
/// use ticketsync_core::snapshot_store::SnapshotStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemorySnapshotStore::new();
/// store.save_snapshot("event:0xabc".to_string(), 42, b"{}".to_vec()).await?;
/// assert_eq!(store.load_snapshot("event:0xabc").await?, Some((42, b"{}".to_vec())));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySnapshotStore {
    data: Arc<RwLock<HashMap<String, SnapshotData>>>,
}

impl InMemorySnapshotStore {
    /// Create a new empty snapshot store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a key exists in the store
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().unwrap().contains_key(key)
    }

    /// Get all keys in the store
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().unwrap().keys().cloned().collect()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn save_snapshot(
        &self,
        key: String,
        checkpoint: u64,
        bytes: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + '_>> {
        Box::pin(async move {
            self.data.write().unwrap().insert(key, (checkpoint, bytes));
            Ok(())
        })
    }

    fn load_snapshot(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<SnapshotData>, SnapshotError>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.data.read().unwrap().get(&key).cloned()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_hash_is_not_found() {
        let store = InMemoryContentStore::new();
        let hash = ContentHash::new("12200000");
        let result = store.fetch(&hash, Duration::from_millis(10)).await;
        assert_eq!(result, Err(ContentStoreError::NotFound(hash.clone())));
        assert_eq!(store.fetched(), vec![hash]);
    }

    #[tokio::test]
    async fn stalled_hash_times_out() {
        let store = InMemoryContentStore::new();
        let hash = ContentHash::new("1220ffff");
        store.insert(hash.clone(), b"late".to_vec());
        store.stall(hash.clone());

        let result = store.fetch(&hash, Duration::from_millis(5)).await;
        assert!(matches!(result, Err(ContentStoreError::Timeout { .. })));

        store.unstall(&hash);
        assert_eq!(store.fetch(&hash, Duration::from_millis(5)).await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn snapshot_overwrite_keeps_latest() {
        let store = InMemorySnapshotStore::new();
        store.save_snapshot("k".into(), 1, vec![1]).await.unwrap();
        store.save_snapshot("k".into(), 2, vec![2]).await.unwrap();
        assert_eq!(store.load_snapshot("k").await.unwrap(), Some((2, vec![2])));
        assert_eq!(store.load_snapshot("missing").await.unwrap(), None);
        assert!(store.contains_key("k"));
    }
}
