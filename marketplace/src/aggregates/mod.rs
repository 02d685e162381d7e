//! Aggregates folded from ledger logs.
//!
//! - [`event::EventAggregate`]: one event contract's catalog and order books
//! - [`user::UserAggregate`]: one account's holdings across event contracts

pub mod event;
pub mod user;

use crate::error::ItemFailure;
use crate::types::Address;

// Log a per-item failure and keep it for the next sync report.
pub(crate) fn record_failure(failures: &mut Vec<ItemFailure>, contract: Address, failure: ItemFailure) {
    match failure.position() {
        Some(position) => tracing::warn!(
            contract = %contract,
            block = position.block_number,
            log_index = position.log_index,
            reason = failure.reason(),
            "{failure}"
        ),
        None => tracing::warn!(contract = %contract, reason = failure.reason(), "{failure}"),
    }
    failures.push(failure);
}
