//! Contract reader trait: on-demand reads of an event contract's catalog.
//!
//! Logs tell what happened; a handful of contract reads tell what exists.
//! Ticket-type discovery needs the type counters (one per fungibility), each
//! type's price and supply, and the aftermarket granularity.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by contract reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractReadError {
    /// The RPC transport failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call reverted or the contract does not exist.
    #[error("Call to {method} on {contract} reverted: {reason}")]
    Reverted {
        /// Contract that was called.
        contract: Address,
        /// Method name.
        method: &'static str,
        /// Revert reason, if any.
        reason: String,
    },
}

/// Price and counters of one ticket type, as stored on the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeMeta {
    /// Face price in the ledger's smallest currency unit.
    pub price: u128,
    /// Total units for sale.
    pub supply: u64,
    /// Units sold so far.
    pub tickets_sold: u64,
}

type ReadFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ContractReadError>> + Send + 'a>>;

/// Read-only view of event contracts.
///
/// # Dyn Compatibility
///
/// Returns `Pin<Box<dyn Future>>` so callers can hold an `Arc<dyn ContractReader>`.
pub trait ContractReader: Send + Sync {
    /// Number of fungible ticket types created so far (type indices are `1..=n`).
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn fungible_nonce(&self, contract: Address) -> ReadFuture<'_, u64>;

    /// Number of non-fungible ticket types created so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn non_fungible_nonce(&self, contract: Address) -> ReadFuture<'_, u64>;

    /// Price, supply and sold counter for the type with this composite id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn ticket_type_meta(&self, contract: Address, ticket_type: U256) -> ReadFuture<'_, TicketTypeMeta>;

    /// Step size for aftermarket percentages.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn granularity(&self, contract: Address) -> ReadFuture<'_, u64>;
}
