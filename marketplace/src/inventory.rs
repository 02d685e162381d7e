//! Ticket inventory: one ticket type's counters, units and order books.
//!
//! A fungible type is a pair of counters (`supply`, `tickets_sold`) plus one
//! order book. A non-fungible type additionally owns its units, each with
//! exactly one owner ([`NULL_ADDRESS`] while unsold) and its own order book
//! for unit-level sell orders.

use crate::metadata::TicketMetadata;
use crate::order_book::{Order, OrderBook};
use crate::types::{Address, NULL_ADDRESS, TicketTypeId, TicketUnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use ticketsync_core::content_store::ContentHash;

/// A sale would push `tickets_sold` past `supply`.
///
/// The counter is clamped to `supply`; the ledger stays authoritative and
/// the local supply is probably stale.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Ticket type {ticket_type}: selling {attempted} more would exceed supply {supply} (sold {sold})")]
pub struct StaleSupply {
    /// Affected type.
    pub ticket_type: TicketTypeId,
    /// Sold counter before the sale.
    pub sold: u64,
    /// Quantity of the sale.
    pub attempted: u64,
    /// Local supply.
    pub supply: u64,
}

/// Lifecycle of a ticket type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketTypeStatus {
    /// Counters are known, descriptive metadata is not.
    Discovered,
    /// Descriptive metadata has been loaded at least once.
    MetadataLoaded,
}

/// One non-fungible unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUnit {
    /// The unit.
    pub unit: TicketUnitId,
    /// Current owner, [`NULL_ADDRESS`] if unsold.
    pub owner: Address,
    /// Sell orders on this unit.
    pub order_book: OrderBook,
}

/// A class of tickets within one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// The type.
    pub type_id: TicketTypeId,
    /// Event contract the type belongs to.
    pub event: Address,
    /// Face price in the ledger's smallest currency unit.
    pub price: u128,
    /// Total units for sale.
    pub supply: u64,
    /// Units sold so far; never above `supply`.
    pub tickets_sold: u64,
    /// Step size for aftermarket percentages.
    pub aftermarket_granularity: u64,
    /// Hash of the latest announced metadata payload.
    pub content_hash: Option<ContentHash>,
    /// Loaded metadata.
    pub metadata: Option<TicketMetadata>,
    /// Orders on the type as a whole.
    pub order_book: OrderBook,
    #[serde(default)]
    loaded_hash: Option<ContentHash>,
    units: BTreeMap<u64, TicketUnit>,
}

fn unsold_unit(type_index: u64, unit_index: u64) -> TicketUnit {
    TicketUnit {
        unit: TicketUnitId::new(type_index, unit_index),
        owner: NULL_ADDRESS,
        order_book: OrderBook::new(),
    }
}

impl TicketType {
    /// A freshly discovered type.
    ///
    /// Non-fungible units `1..=supply` start unsold. A unit is only stored
    /// once its owner changes or an order rests on it.
    #[must_use]
    pub const fn new(type_id: TicketTypeId, event: Address, price: u128, supply: u64, granularity: u64) -> Self {
        Self {
            type_id,
            event,
            price,
            supply,
            tickets_sold: 0,
            aftermarket_granularity: granularity,
            content_hash: None,
            metadata: None,
            order_book: OrderBook::new(),
            loaded_hash: None,
            units: BTreeMap::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> TicketTypeStatus {
        if self.metadata.is_some() {
            TicketTypeStatus::MetadataLoaded
        } else {
            TicketTypeStatus::Discovered
        }
    }

    /// Refresh catalog data after a re-read. Counters and owners are kept;
    /// a larger non-fungible supply extends the range of unsold units.
    pub fn update_catalog(&mut self, price: u128, supply: u64, granularity: u64) {
        self.price = price;
        self.supply = supply.max(self.tickets_sold);
        self.aftermarket_granularity = granularity;
    }

    /// Count a primary sale of `quantity` tickets.
    ///
    /// # Errors
    ///
    /// Returns [`StaleSupply`] when the counter had to be clamped to `supply`.
    pub fn record_sale(&mut self, quantity: u64) -> Result<(), StaleSupply> {
        let sold = self.tickets_sold;
        let wanted = sold.saturating_add(quantity);
        if wanted > self.supply {
            self.tickets_sold = self.supply;
            return Err(StaleSupply {
                ticket_type: self.type_id,
                sold,
                attempted: quantity,
                supply: self.supply,
            });
        }
        self.tickets_sold = wanted;
        Ok(())
    }

    /// Whether `unit_index` names a unit of this type.
    #[must_use]
    pub fn has_unit(&self, unit_index: u64) -> bool {
        !self.type_id.is_fungible && ((1..=self.supply).contains(&unit_index) || self.units.contains_key(&unit_index))
    }

    /// Set the owner of a unit, inserting it if unknown. Returns the previous
    /// owner, [`NULL_ADDRESS`] for an untouched unit within supply.
    pub fn upsert_unit(&mut self, unit_index: u64, owner: Address) -> Option<Address> {
        let previous = self.owner(unit_index);
        let type_index = self.type_id.type_index;
        self.units
            .entry(unit_index)
            .or_insert_with(|| unsold_unit(type_index, unit_index))
            .owner = owner;
        previous
    }

    /// Units stored so far (owned at some point or carrying orders), in index order.
    pub fn units(&self) -> impl Iterator<Item = &TicketUnit> {
        self.units.values()
    }

    /// One stored unit.
    #[must_use]
    pub fn unit(&self, unit_index: u64) -> Option<&TicketUnit> {
        self.units.get(&unit_index)
    }

    /// One unit, mutably, storing it first if it is part of the type.
    pub fn unit_mut(&mut self, unit_index: u64) -> Option<&mut TicketUnit> {
        if !self.has_unit(unit_index) {
            return None;
        }
        let type_index = self.type_id.type_index;
        Some(
            self.units
                .entry(unit_index)
                .or_insert_with(|| unsold_unit(type_index, unit_index)),
        )
    }

    /// Owner of a unit.
    #[must_use]
    pub fn owner(&self, unit_index: u64) -> Option<Address> {
        match self.units.get(&unit_index) {
            Some(unit) => Some(unit.owner),
            None => self.has_unit(unit_index).then_some(NULL_ADDRESS),
        }
    }

    /// Fungible: any unsold ticket left. Non-fungible: the unit is unowned;
    /// without a unit, whether any unit is unowned.
    #[must_use]
    pub fn is_available(&self, unit_index: Option<u64>) -> bool {
        if self.type_id.is_fungible {
            return self.tickets_sold < self.supply;
        }
        match unit_index {
            Some(index) => self.owner(index) == Some(NULL_ADDRESS),
            None => {
                let stored = self.units.range(1..=self.supply).count();
                u64::try_from(stored).is_ok_and(|stored| stored < self.supply)
                    || self.units.values().any(|u| u.owner == NULL_ADDRESS)
            },
        }
    }

    /// Record an announced payload hash. Returns `true` if it still has to be loaded.
    pub fn announce_metadata(&mut self, content_hash: ContentHash) -> bool {
        let needs_load = self.loaded_hash.as_ref() != Some(&content_hash);
        self.content_hash = Some(content_hash);
        needs_load
    }

    /// Announced hash whose payload has not been loaded yet.
    #[must_use]
    pub fn pending_metadata(&self) -> Option<&ContentHash> {
        self.content_hash
            .as_ref()
            .filter(|hash| self.loaded_hash.as_ref() != Some(*hash))
    }

    /// Record loaded metadata. Re-applying identical content changes nothing.
    pub fn attach_metadata(&mut self, content_hash: ContentHash, metadata: TicketMetadata) {
        self.content_hash = Some(content_hash.clone());
        self.loaded_hash = Some(content_hash);
        self.metadata = Some(metadata);
    }

    /// Cheapest sell order, on the type or on one unit.
    #[must_use]
    pub fn lowest_sell_order(&self, unit_index: Option<u64>) -> Option<&Order> {
        match unit_index {
            Some(index) => self.unit(index)?.order_book.lowest_sell_order(),
            None => self.order_book.lowest_sell_order(),
        }
    }

    /// Whether any sell order rests on the type or on one unit.
    #[must_use]
    pub fn has_sell_orders(&self, unit_index: Option<u64>) -> bool {
        match unit_index {
            Some(index) => self
                .unit(index)
                .is_some_and(|u| u.order_book.has_sell_orders()),
            None => self.order_book.has_sell_orders(),
        }
    }

    /// Price of an aftermarket order at `percentage` of face value.
    #[must_use]
    pub fn aftermarket_price(&self, percentage: u64) -> u128 {
        self.price.saturating_mul(u128::from(percentage)) / 100
    }
}
