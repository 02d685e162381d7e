//! Event log trait: read-only access to past ledger logs.
//!
//! The ledger RPC client is an external collaborator. The core only needs two
//! things from it: the logs a contract emitted within a block range, and the
//! current head block (to know how far a catch-up pass reached when nothing
//! was emitted).
//!
//! # Implementations
//!
//! - `InMemoryEventLog` (in `ticketsync-testing` crate): Fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use ticketsync_core::event_log::{EventFilter, EventLog, EventLogError};
//! use ticketsync_core::position::BlockTag;
//! use ticketsync_core::Address;
//!
//! async fn example<L: EventLog>(log: &L, contract: Address) -> Result<(), EventLogError> {
//!     let entries = log
//!         .get_past_logs(contract, EventFilter::All, 11, BlockTag::Number(14))
//!         .await?;
//!     let head = log.latest_block().await?;
//!     Ok(())
//! }
//! ```

use crate::event::LogEntry;
use crate::position::BlockTag;
use alloy_primitives::Address;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur while querying past logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    /// The RPC transport failed (connection refused, timeout, bad response).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The requested range is invalid for the node (e.g. `from > to`).
    #[error("Invalid block range: from {from} to {to}")]
    InvalidRange {
        /// First requested block.
        from: u64,
        /// Last requested block.
        to: BlockTag,
    },

    /// The node rejected the query (unknown contract, too many results).
    #[error("Query rejected: {0}")]
    Rejected(String),
}

/// Which event names a log query returns.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventFilter {
    /// Every event the contract emitted.
    All,
    /// Only events with this name.
    Kind(String),
}

impl EventFilter {
    /// Filter for one event name.
    #[must_use]
    pub fn kind(name: impl Into<String>) -> Self {
        Self::Kind(name.into())
    }

    /// Whether an event name passes the filter.
    #[must_use]
    pub fn matches(&self, event_kind: &str) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => kind == event_kind,
        }
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "allEvents"),
            Self::Kind(kind) => write!(f, "{kind}"),
        }
    }
}

/// Read-only source of past ledger logs.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared by several replay
/// passes running concurrently on different aggregates.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// to enable trait object usage (`Arc<dyn EventLog>`).
pub trait EventLog: Send + Sync {
    /// Logs emitted by `contract` between `from_block` and `to_block`, inclusive.
    ///
    /// Results are in ascending `(block_number, log_index)` order. An empty
    /// range yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// - `Transport`: the node could not be reached
    /// - `InvalidRange`: `from_block` lies after `to_block`
    /// - `Rejected`: the node refused the query
    fn get_past_logs(
        &self,
        contract: Address,
        filter: EventFilter,
        from_block: u64,
        to_block: BlockTag,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogEntry>, EventLogError>> + Send + '_>>;

    /// Current head block number.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the node could not be reached.
    fn latest_block(&self) -> Pin<Box<dyn Future<Output = Result<u64, EventLogError>> + Send + '_>>;
}
