//! Aftermarket order book.
//!
//! Buy and sell orders for one ticket type (or one non-fungible unit). An
//! order is identified by `(address, percentage, ticket_id)`; placing an
//! order under an existing key replaces its quantity in place, so a replayed
//! placement leaves the book unchanged. Fills and withdrawals remove the
//! matching entry and are no-ops when it is already gone.

use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the book an order rests on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// Offers to buy.
    Buy,
    /// Offers to sell.
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A resting aftermarket order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Account that placed the order.
    pub address: Address,
    /// Price as a percentage of the face price.
    pub percentage: u64,
    /// Number of tickets.
    pub quantity: u64,
    /// Unit index, for orders on a specific non-fungible unit.
    pub ticket_id: Option<u64>,
}

impl Order {
    /// The identity of this order within a book.
    #[must_use]
    pub const fn key(&self) -> OrderKey {
        OrderKey {
            address: self.address,
            percentage: self.percentage,
            ticket_id: self.ticket_id,
        }
    }
}

/// Identity of an order within a book.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderKey {
    /// Account that placed the order.
    pub address: Address,
    /// Price as a percentage of the face price.
    pub percentage: u64,
    /// Unit index, if any.
    pub ticket_id: Option<u64>,
}

/// Result of placing an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// No order had this key; it was appended.
    Inserted,
    /// An order with this key existed; its quantity was replaced.
    Replaced {
        /// Quantity before the replacement.
        previous_quantity: u64,
    },
}

/// Buy and sell orders, each kept in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    buy_orders: Vec<Order>,
    sell_orders: Vec<Order>,
}

impl OrderBook {
    /// Create an empty book.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buy_orders: Vec::new(),
            sell_orders: Vec::new(),
        }
    }

    /// Orders on one side, in insertion order.
    #[must_use]
    pub fn orders(&self, side: OrderSide) -> &[Order] {
        match side {
            OrderSide::Buy => &self.buy_orders,
            OrderSide::Sell => &self.sell_orders,
        }
    }

    /// Buy orders, in insertion order.
    #[must_use]
    pub fn buy_orders(&self) -> &[Order] {
        &self.buy_orders
    }

    /// Sell orders, in insertion order.
    #[must_use]
    pub fn sell_orders(&self) -> &[Order] {
        &self.sell_orders
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut Vec<Order> {
        match side {
            OrderSide::Buy => &mut self.buy_orders,
            OrderSide::Sell => &mut self.sell_orders,
        }
    }

    /// Place an order, replacing the quantity of an existing order with the same key.
    pub fn add(&mut self, side: OrderSide, order: Order) -> Placement {
        let key = order.key();
        let orders = self.side_mut(side);
        if let Some(existing) = orders.iter_mut().find(|o| o.key() == key) {
            let previous_quantity = existing.quantity;
            existing.quantity = order.quantity;
            Placement::Replaced { previous_quantity }
        } else {
            orders.push(order);
            Placement::Inserted
        }
    }

    /// Remove the order with this key, returning it. Absent keys are a no-op.
    pub fn remove(&mut self, side: OrderSide, key: &OrderKey) -> Option<Order> {
        let orders = self.side_mut(side);
        let index = orders.iter().position(|o| o.key() == *key)?;
        Some(orders.remove(index))
    }

    /// Sell order with the smallest percentage; the earliest placed wins ties.
    #[must_use]
    pub fn lowest_sell_order(&self) -> Option<&Order> {
        self.sell_orders.iter().min_by_key(|o| o.percentage)
    }

    /// Orders placed by `address` on one side, in insertion order.
    #[must_use]
    pub fn orders_by_address(&self, side: OrderSide, address: Address) -> Vec<&Order> {
        self.orders(side)
            .iter()
            .filter(|o| o.address == address)
            .collect()
    }

    /// Whether any sell order rests in the book.
    #[must_use]
    pub fn has_sell_orders(&self) -> bool {
        !self.sell_orders.is_empty()
    }

    /// Whether both sides are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buy_orders.is_empty() && self.sell_orders.is_empty()
    }
}
