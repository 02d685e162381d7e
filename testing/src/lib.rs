//! # Ticketsync Testing
//!
//! Testing utilities and helpers for ticketsync.
//!
//! This crate provides:
//! - In-memory implementations of every collaborator trait in `ticketsync-core`
//! - Builders for raw log entries and deterministic addresses
//! - A Given-When-Then harness for reducers
//!
//! ## Example
//!
//! ```ignore
//! use ticketsync_testing::{InMemoryEventLog, helpers::{log_entry, test_address}};
//!
//! #[tokio::test]
//! async fn test_gap_fill() {
//!     let contract = test_address(0xee);
//!     let log = InMemoryEventLog::new();
//!     log.push(log_entry(contract, 12, 0, "MintFungibles", json!({ ... })));
//!
//!     let report = coordinator.sync(&mut aggregate, contract, fresh).await?;
//!     assert_eq!(log.queries()[0].from_block, 11);
//! }
//! ```

mod contract_mock;
mod log_mocks;
mod store_mocks;

/// In-memory collaborators.
pub mod mocks {
    pub use crate::contract_mock::InMemoryContractReader;
    pub use crate::log_mocks::{InMemoryEventLog, LogQuery};
    pub use crate::store_mocks::{InMemoryContentStore, InMemorySnapshotStore};
}

/// Test helpers and builders.
pub mod helpers {
    use alloy_primitives::Address;
    use serde_json::Value;
    use ticketsync_core::event::LogEntry;
    use ticketsync_core::position::LogPosition;

    /// Deterministic address made of one repeated byte.
    #[must_use]
    pub fn test_address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    /// Raw log entry at `(block, log_index)`.
    #[must_use]
    pub fn log_entry(
        contract: Address,
        block: u64,
        log_index: u64,
        event_kind: &str,
        return_values: Value,
    ) -> LogEntry {
        LogEntry::new(
            contract,
            LogPosition::new(block, log_index),
            event_kind,
            return_values,
        )
    }

    /// Install a test-friendly `tracing` subscriber (once per process).
    ///
    /// Honors `RUST_LOG`; output goes through the test harness capture.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "ticketsync=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::{
    InMemoryContentStore, InMemoryContractReader, InMemoryEventLog, InMemorySnapshotStore, LogQuery,
};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::helpers::{log_entry, test_address};
    use serde_json::json;

    #[test]
    fn log_entry_builder_sets_position() {
        let entry = log_entry(test_address(0xee), 15, 3, "MintFungibles", json!({ "quantity": "1" }));
        assert_eq!(entry.position.block_number, 15);
        assert_eq!(entry.position.log_index, 3);
        assert_eq!(entry.contract, test_address(0xee));
    }
}
