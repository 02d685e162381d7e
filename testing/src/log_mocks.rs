//! In-memory event log for replay tests
//!
//! [`InMemoryEventLog`] serves pre-seeded entries per contract, records every
//! query it answers (so gap-fill ranges can be asserted exactly) and can be
//! switched into a failing mode to exercise the "log fetch failed" path.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use alloy_primitives::Address;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use ticketsync_core::event::LogEntry;
use ticketsync_core::event_log::{EventFilter, EventLog, EventLogError};
use ticketsync_core::position::BlockTag;

/// One answered (or refused) past-log query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    /// Contract queried.
    pub contract: Address,
    /// Event filter.
    pub filter: EventFilter,
    /// First block requested.
    pub from_block: u64,
    /// Upper bound requested.
    pub to_block: BlockTag,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LogEntry>,
    queries: Vec<LogQuery>,
    head: u64,
    failure: Option<EventLogError>,
}

/// In-memory event log for fast, deterministic testing.
///
/// The head block tracks the highest block pushed unless set explicitly.
///
/// # Example
///
/// ```
/// use ticketsync_testing::InMemoryEventLog;
/// use ticketsync_testing::helpers::{log_entry, test_address};
/// use ticketsync_core::event_log::{EventFilter, EventLog};
/// use ticketsync_core::position::BlockTag;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let contract = test_address(0xee);
/// let log = InMemoryEventLog::new();
/// log.push(log_entry(contract, 12, 0, "MintFungibles", json!({})));
///
/// let entries = log.get_past_logs(contract, EventFilter::All, 11, BlockTag::Number(14)).await?;
/// assert_eq!(entries.len(), 1);
/// assert_eq!(log.queries()[0].from_block, 11);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventLog {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventLog {
    /// Create a new empty event log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, raising the head block if needed
    pub fn push(&self, entry: LogEntry) {
        let mut inner = self.inner.write().unwrap();
        inner.head = inner.head.max(entry.block_number());
        inner.entries.push(entry);
    }

    /// Append several entries
    pub fn extend(&self, entries: impl IntoIterator<Item = LogEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    /// Force the head block (e.g. empty blocks after the last emitted log)
    pub fn set_head(&self, head: u64) {
        self.inner.write().unwrap().head = head;
    }

    /// Make every following query fail with `error`
    pub fn fail_with(&self, error: EventLogError) {
        self.inner.write().unwrap().failure = Some(error);
    }

    /// Stop failing
    pub fn recover(&self) {
        self.inner.write().unwrap().failure = None;
    }

    /// Every query received so far, in order
    #[must_use]
    pub fn queries(&self) -> Vec<LogQuery> {
        self.inner.read().unwrap().queries.clone()
    }

    /// Forget recorded queries (entries are kept)
    pub fn clear_queries(&self) {
        self.inner.write().unwrap().queries.clear();
    }
}

impl EventLog for InMemoryEventLog {
    fn get_past_logs(
        &self,
        contract: Address,
        filter: EventFilter,
        from_block: u64,
        to_block: BlockTag,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogEntry>, EventLogError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().unwrap();
            inner.queries.push(LogQuery {
                contract,
                filter: filter.clone(),
                from_block,
                to_block,
            });
            if let Some(error) = inner.failure.clone() {
                return Err(error);
            }

            let to = to_block.resolve(inner.head);
            if from_block > to && to_block != BlockTag::Latest {
                return Err(EventLogError::InvalidRange {
                    from: from_block,
                    to: to_block,
                });
            }

            let mut entries: Vec<LogEntry> = inner
                .entries
                .iter()
                .filter(|e| e.contract == contract)
                .filter(|e| (from_block..=to).contains(&e.block_number()))
                .filter(|e| filter.matches(&e.event_kind))
                .cloned()
                .collect();
            entries.sort_by_key(|e| e.position);
            Ok(entries)
        })
    }

    fn latest_block(&self) -> Pin<Box<dyn Future<Output = Result<u64, EventLogError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.inner.read().unwrap();
            if let Some(error) = inner.failure.clone() {
                return Err(error);
            }
            Ok(inner.head)
        })
    }
}
