//! In-memory contract reader
//!
//! Ticket types are keyed by their composite id so the mock stays agnostic
//! of how ids are laid out.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use alloy_primitives::{Address, U256};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use ticketsync_core::contract::{ContractReadError, ContractReader, TicketTypeMeta};

#[derive(Debug, Default, Clone)]
struct ContractData {
    fungible_nonce: u64,
    non_fungible_nonce: u64,
    granularity: u64,
    ticket_types: HashMap<U256, TicketTypeMeta>,
    reverting: HashSet<U256>,
}

/// In-memory contract reader for fast, deterministic testing.
///
/// Unknown contracts read as empty (both nonces zero).
///
/// # Example
///
/// ```
/// use ticketsync_testing::InMemoryContractReader;
/// use ticketsync_testing::helpers::test_address;
/// use ticketsync_core::contract::{ContractReader, TicketTypeMeta};
/// use alloy_primitives::U256;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let contract = test_address(0xee);
/// let reader = InMemoryContractReader::new();
/// reader.set_nonces(contract, 1, 0);
/// reader.set_ticket_type(contract, U256::from(1u64) << 128_usize, TicketTypeMeta { price: 10, supply: 5, tickets_sold: 0 });
///
/// assert_eq!(reader.fungible_nonce(contract).await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryContractReader {
    contracts: Arc<RwLock<HashMap<Address, ContractData>>>,
    offline: Arc<RwLock<bool>>,
}

impl InMemoryContractReader {
    /// Create a new reader with no contracts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both type counters of `contract`
    pub fn set_nonces(&self, contract: Address, fungible: u64, non_fungible: u64) {
        let mut contracts = self.contracts.write().unwrap();
        let data = contracts.entry(contract).or_default();
        data.fungible_nonce = fungible;
        data.non_fungible_nonce = non_fungible;
    }

    /// Set the aftermarket granularity of `contract`
    pub fn set_granularity(&self, contract: Address, granularity: u64) {
        self.contracts
            .write()
            .unwrap()
            .entry(contract)
            .or_default()
            .granularity = granularity;
    }

    /// Set the meta of the type with composite id `ticket_type`
    pub fn set_ticket_type(&self, contract: Address, ticket_type: U256, meta: TicketTypeMeta) {
        self.contracts
            .write()
            .unwrap()
            .entry(contract)
            .or_default()
            .ticket_types
            .insert(ticket_type, meta);
    }

    /// Make meta reads of `ticket_type` revert
    pub fn revert_ticket_type(&self, contract: Address, ticket_type: U256) {
        self.contracts
            .write()
            .unwrap()
            .entry(contract)
            .or_default()
            .reverting
            .insert(ticket_type);
    }

    /// Let meta reads of `ticket_type` succeed again
    pub fn restore_ticket_type(&self, contract: Address, ticket_type: U256) {
        if let Some(data) = self.contracts.write().unwrap().get_mut(&contract) {
            data.reverting.remove(&ticket_type);
        }
    }

    /// Make every read fail with a transport error
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write().unwrap() = offline;
    }

    fn read<T>(
        &self,
        contract: Address,
        f: impl FnOnce(&ContractData) -> Result<T, ContractReadError>,
    ) -> Result<T, ContractReadError> {
        if *self.offline.read().unwrap() {
            return Err(ContractReadError::Transport("node unreachable".to_string()));
        }
        let contracts = self.contracts.read().unwrap();
        let empty = ContractData::default();
        f(contracts.get(&contract).unwrap_or(&empty))
    }
}

type ReadFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ContractReadError>> + Send + 'a>>;

impl ContractReader for InMemoryContractReader {
    fn fungible_nonce(&self, contract: Address) -> ReadFuture<'_, u64> {
        let result = self.read(contract, |data| Ok(data.fungible_nonce));
        Box::pin(async move { result })
    }

    fn non_fungible_nonce(&self, contract: Address) -> ReadFuture<'_, u64> {
        let result = self.read(contract, |data| Ok(data.non_fungible_nonce));
        Box::pin(async move { result })
    }

    fn ticket_type_meta(&self, contract: Address, ticket_type: U256) -> ReadFuture<'_, TicketTypeMeta> {
        let result = self.read(contract, |data| {
            if data.reverting.contains(&ticket_type) {
                return Err(ContractReadError::Reverted {
                    contract,
                    method: "ticketTypeMeta",
                    reason: "forced revert".to_string(),
                });
            }
            data.ticket_types
                .get(&ticket_type)
                .copied()
                .ok_or_else(|| ContractReadError::Reverted {
                    contract,
                    method: "ticketTypeMeta",
                    reason: format!("no ticket type {ticket_type}"),
                })
        });
        Box::pin(async move { result })
    }

    fn granularity(&self, contract: Address) -> ReadFuture<'_, u64> {
        let result = self.read(contract, |data| Ok(data.granularity));
        Box::pin(async move { result })
    }
}
