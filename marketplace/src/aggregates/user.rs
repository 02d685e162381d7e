//! User aggregate: one account's holdings, orders and presale participation.
//!
//! Only entries whose participants include the account are folded. One user
//! folds logs of many event contracts, so checkpoints are kept per contract.

use super::record_failure;
use crate::error::ItemFailure;
use crate::events::{MarketplaceEvent, OrderEvent, OrderLeg, OrderLifecycle};
use crate::order_book::OrderSide;
use crate::types::{
    Address, DecodedId, FungibleHolding, NonFungibleHolding, PresaleState, TicketTypeId, TicketUnitId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ticketsync_core::effect::Effect;
use ticketsync_core::position::LogPosition;
use ticketsync_core::reducer::Reducer;
use ticketsync_core::{SmallVec, smallvec};

/// An order the account has resting on some event's book.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOrder {
    /// Event contract.
    pub event: Address,
    /// Ordered type.
    pub ticket_type: TicketTypeId,
    /// Unit index, for orders on one unit.
    pub ticket_id: Option<u64>,
    /// Price as a percentage of face value.
    pub percentage: u64,
    /// Number of tickets.
    pub quantity: u64,
}

impl UserOrder {
    fn same_key(&self, other: &Self) -> bool {
        self.event == other.event
            && self.ticket_type == other.ticket_type
            && self.ticket_id == other.ticket_id
            && self.percentage == other.percentage
    }
}

/// Presale participation in one type of one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleEntry {
    /// Event contract.
    pub event: Address,
    /// Type on presale.
    pub ticket_type: TicketTypeId,
    /// Current state.
    pub state: PresaleState,
}

/// Local model of one account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserState {
    account: Address,
    balance: u128,
    fungible: Vec<FungibleHolding>,
    non_fungible: Vec<NonFungibleHolding>,
    buy_orders: Vec<UserOrder>,
    sell_orders: Vec<UserOrder>,
    presales: BTreeMap<(Address, TicketTypeId), PresaleState>,
    approvals: BTreeMap<Address, u64>,
    checkpoints: BTreeMap<Address, LogPosition>,
    failures: Vec<ItemFailure>,
}

impl UserState {
    /// A fresh account with nothing folded.
    #[must_use]
    pub const fn new(account: Address) -> Self {
        Self {
            account,
            balance: 0,
            fungible: Vec::new(),
            non_fungible: Vec::new(),
            buy_orders: Vec::new(),
            sell_orders: Vec::new(),
            presales: BTreeMap::new(),
            approvals: BTreeMap::new(),
            checkpoints: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    /// The account.
    #[must_use]
    pub const fn account(&self) -> Address {
        self.account
    }

    /// Last reported balance.
    #[must_use]
    pub const fn balance(&self) -> u128 {
        self.balance
    }

    /// Fungible holdings, one per `(event, type)`.
    #[must_use]
    pub fn fungible_holdings(&self) -> &[FungibleHolding] {
        &self.fungible
    }

    /// Non-fungible holdings, one per unit.
    #[must_use]
    pub fn non_fungible_holdings(&self) -> &[NonFungibleHolding] {
        &self.non_fungible
    }

    /// Every entry of `contract` at or before this position has been folded.
    #[must_use]
    pub fn checkpoint(&self, contract: Address) -> LogPosition {
        self.checkpoints
            .get(&contract)
            .copied()
            .unwrap_or(LogPosition::end_of_block(0))
    }

    /// Block of the checkpoint of `contract`.
    #[must_use]
    pub fn last_synced_block(&self, contract: Address) -> u64 {
        self.checkpoint(contract).block_number
    }

    /// Level granted by `approver`, if it ever set one.
    #[must_use]
    pub fn approval_level(&self, approver: Address) -> Option<u64> {
        self.approvals.get(&approver).copied()
    }

    /// Whether `approver` granted at least `level`. A level of zero means
    /// the approval was withdrawn.
    #[must_use]
    pub fn is_approved(&self, approver: Address, level: u64) -> bool {
        self.approval_level(approver)
            .is_some_and(|granted| granted > 0 && granted >= level)
    }

    /// Fungible tickets held of one type.
    #[must_use]
    pub fn fungible_quantity(&self, event: Address, type_index: u64) -> u64 {
        self.fungible
            .iter()
            .find(|h| h.event == event && h.type_index == type_index)
            .map_or(0, |h| h.quantity)
    }

    /// Whether at least `min_quantity` fungible tickets of a type are held.
    #[must_use]
    pub fn owns_fungible(&self, event: Address, type_index: u64, min_quantity: u64) -> bool {
        self.fungible_quantity(event, type_index) >= min_quantity.max(1)
    }

    /// The holding of one unit, if held.
    #[must_use]
    pub fn owns_non_fungible(&self, event: Address, unit: TicketUnitId) -> Option<&NonFungibleHolding> {
        self.non_fungible
            .iter()
            .find(|h| h.event == event && h.unit == unit)
    }

    /// Tickets held for one event, fungible quantities plus units.
    #[must_use]
    pub fn tickets_owned_for_event(&self, event: Address) -> u64 {
        let fungible: u64 = self
            .fungible
            .iter()
            .filter(|h| h.event == event)
            .map(|h| h.quantity)
            .sum();
        let units = self.non_fungible.iter().filter(|h| h.event == event).count();
        fungible.saturating_add(u64::try_from(units).unwrap_or(u64::MAX))
    }

    /// Sell orders on a type, optionally narrowed to one unit.
    #[must_use]
    pub fn sell_orders(&self, event: Address, ticket_type: TicketTypeId, unit_index: Option<u64>) -> Vec<&UserOrder> {
        self.sell_orders
            .iter()
            .filter(|o| o.event == event && o.ticket_type == ticket_type)
            .filter(|o| unit_index.is_none() || o.ticket_id == unit_index)
            .collect()
    }

    /// Buy orders on any type of one event.
    #[must_use]
    pub fn buy_orders(&self, event: Address) -> Vec<&UserOrder> {
        self.buy_orders.iter().filter(|o| o.event == event).collect()
    }

    /// Presale participation in one type.
    #[must_use]
    pub fn presale_state(&self, event: Address, ticket_type: TicketTypeId) -> Option<PresaleState> {
        self.presales.get(&(event, ticket_type)).copied()
    }

    /// Whether any joined presale is still waiting for its outcome.
    #[must_use]
    pub fn has_active_presale(&self) -> bool {
        self.presales.values().any(PresaleState::is_active)
    }

    /// Take the per-item failures recorded since the last call.
    pub fn drain_failures(&mut self) -> Vec<ItemFailure> {
        std::mem::take(&mut self.failures)
    }

    fn add_fungible(&mut self, event: Address, type_index: u64, quantity: u64) {
        match self
            .fungible
            .iter_mut()
            .find(|h| h.event == event && h.type_index == type_index)
        {
            Some(holding) => holding.quantity = holding.quantity.saturating_add(quantity),
            None if quantity > 0 => self.fungible.push(FungibleHolding {
                event,
                type_index,
                quantity,
            }),
            None => {},
        }
    }

    fn remove_fungible(&mut self, event: Address, type_index: u64, quantity: u64) {
        let Some(index) = self
            .fungible
            .iter()
            .position(|h| h.event == event && h.type_index == type_index)
        else {
            tracing::debug!(account = %self.account, event = %event, type_index, "No fungible holding to decrement");
            return;
        };
        let holding = &mut self.fungible[index];
        holding.quantity = holding.quantity.saturating_sub(quantity);
        if holding.quantity == 0 {
            self.fungible.remove(index);
        }
    }

    fn add_unit(&mut self, event: Address, unit: TicketUnitId) {
        if self.owns_non_fungible(event, unit).is_none() {
            self.non_fungible.push(NonFungibleHolding { event, unit });
        }
    }

    fn remove_unit(&mut self, event: Address, unit: TicketUnitId) {
        let before = self.non_fungible.len();
        self.non_fungible.retain(|h| h.event != event || h.unit != unit);
        if self.non_fungible.len() == before {
            tracing::debug!(account = %self.account, event = %event, unit = %unit, "No unit holding to remove");
        }
    }

    fn orders_mut(&mut self, side: OrderSide) -> &mut Vec<UserOrder> {
        match side {
            OrderSide::Buy => &mut self.buy_orders,
            OrderSide::Sell => &mut self.sell_orders,
        }
    }

    fn place_order(&mut self, side: OrderSide, order: UserOrder) {
        let orders = self.orders_mut(side);
        match orders.iter_mut().find(|o| o.same_key(&order)) {
            Some(existing) => existing.quantity = order.quantity,
            None => orders.push(order),
        }
    }

    fn remove_order(&mut self, side: OrderSide, order: &UserOrder) -> bool {
        let orders = self.orders_mut(side);
        let before = orders.len();
        orders.retain(|o| !o.same_key(order));
        orders.len() != before
    }

    /// Serializable form of this state.
    #[must_use]
    pub fn to_snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            account: self.account,
            balance: self.balance,
            fungible: self.fungible.clone(),
            non_fungible: self.non_fungible.clone(),
            buy_orders: self.buy_orders.clone(),
            sell_orders: self.sell_orders.clone(),
            presales: self
                .presales
                .iter()
                .map(|(&(event, ticket_type), &state)| PresaleEntry {
                    event,
                    ticket_type,
                    state,
                })
                .collect(),
            approvals: self.approvals.iter().map(|(&a, &l)| (a, l)).collect(),
            checkpoints: self.checkpoints.iter().map(|(&c, &p)| (c, p)).collect(),
        }
    }

    /// Rebuild a state from its snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: UserSnapshot) -> Self {
        Self {
            account: snapshot.account,
            balance: snapshot.balance,
            fungible: snapshot.fungible,
            non_fungible: snapshot.non_fungible,
            buy_orders: snapshot.buy_orders,
            sell_orders: snapshot.sell_orders,
            presales: snapshot
                .presales
                .into_iter()
                .map(|entry| ((entry.event, entry.ticket_type), entry.state))
                .collect(),
            approvals: snapshot.approvals.into_iter().collect(),
            checkpoints: snapshot.checkpoints.into_iter().collect(),
            failures: Vec::new(),
        }
    }
}

/// Serializable form of a [`UserState`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    /// The account.
    pub account: Address,
    /// Last reported balance.
    pub balance: u128,
    /// Fungible holdings.
    pub fungible: Vec<FungibleHolding>,
    /// Non-fungible holdings.
    pub non_fungible: Vec<NonFungibleHolding>,
    /// Resting buy orders.
    pub buy_orders: Vec<UserOrder>,
    /// Resting sell orders.
    pub sell_orders: Vec<UserOrder>,
    /// Presale participation.
    pub presales: Vec<PresaleEntry>,
    /// Approval level per approver.
    #[serde(default)]
    pub approvals: Vec<(Address, u64)>,
    /// Checkpoint per event contract.
    pub checkpoints: Vec<(Address, LogPosition)>,
}

/// Inputs of the [`UserReducer`].
#[derive(Clone, Debug)]
pub enum UserAction {
    /// A log entry of `contract` that concerns the account.
    Replayed {
        /// Emitting event contract.
        contract: Address,
        /// Where the entry was emitted.
        position: LogPosition,
        /// Normalized entry.
        event: MarketplaceEvent,
    },
    /// Wallet balance polled by the caller.
    BalanceUpdated {
        /// New balance.
        balance: u128,
    },
    /// An approver (e.g. an identity verifier) set the account's level.
    ApprovalLevelSet {
        /// Granting party.
        approver: Address,
        /// Granted level, zero to withdraw.
        level: u64,
    },
    /// Every entry of `contract` up to `position` has been folded.
    Synced {
        /// Event contract.
        contract: Address,
        /// New checkpoint.
        position: LogPosition,
    },
}

/// Folds [`UserAction`]s into a [`UserState`].
#[derive(Clone, Copy, Debug, Default)]
pub struct UserReducer;

impl Reducer for UserReducer {
    type State = UserState;
    type Action = UserAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            UserAction::Replayed {
                contract,
                position,
                event,
            } => apply_replayed(state, contract, position, event),
            UserAction::BalanceUpdated { balance } => state.balance = balance,
            UserAction::ApprovalLevelSet { approver, level } => {
                tracing::debug!(account = %state.account, approver = %approver, level, "Approval level set");
                state.approvals.insert(approver, level);
            },
            UserAction::Synced { contract, position } => {
                let checkpoint = state
                    .checkpoints
                    .entry(contract)
                    .or_insert(LogPosition::end_of_block(0));
                *checkpoint = (*checkpoint).max(position);
            },
        }
        smallvec![Effect::None]
    }
}

fn apply_replayed(state: &mut UserState, contract: Address, position: LogPosition, event: MarketplaceEvent) {
    let me = state.account;
    match event {
        MarketplaceEvent::MintFungibles {
            owner,
            ticket_type,
            quantity,
        } if owner == me => {
            if ticket_type.is_fungible {
                state.add_fungible(contract, ticket_type.type_index, quantity);
            } else {
                state.fail_malformed(contract, position, "MintFungibles", "minted type is not fungible");
            }
        },
        MarketplaceEvent::MintNonFungibles { owner, units } if owner == me => {
            for unit in units {
                state.add_unit(contract, unit);
            }
        },
        MarketplaceEvent::Order(order) => apply_order(state, contract, &order),
        MarketplaceEvent::PresaleJoined {
            addr,
            ticket_type,
            lucky_number,
        } if addr == me => {
            state
                .presales
                .insert((contract, ticket_type), PresaleState::Joined { lucky_number });
        },
        MarketplaceEvent::TicketClaimed { addr, ticket_type } if addr == me => {
            state
                .presales
                .insert((contract, ticket_type), PresaleState::Claimed);
        },
        MarketplaceEvent::TicketPriceRefunded { addr, ticket_type } if addr == me => {
            state
                .presales
                .insert((contract, ticket_type), PresaleState::Refunded);
        },
        MarketplaceEvent::TicketTransferred {
            from,
            to,
            ticket,
            quantity,
        } => {
            if from == me {
                release(state, contract, ticket, quantity);
            }
            if to == me {
                acquire(state, contract, ticket, quantity);
            }
        },
        _ => {
            tracing::trace!(account = %me, contract = %contract, %position, "Entry does not change the account");
        },
    }
}

impl UserState {
    fn fail_malformed(&mut self, contract: Address, position: LogPosition, kind: &str, reason: &str) {
        record_failure(
            &mut self.failures,
            contract,
            ItemFailure::Malformed {
                position,
                kind: kind.to_string(),
                reason: reason.to_string(),
            },
        );
    }
}

fn acquire(state: &mut UserState, contract: Address, ticket: DecodedId, quantity: u64) {
    match ticket {
        DecodedId::Type(ticket_type) => state.add_fungible(contract, ticket_type.type_index, quantity),
        DecodedId::Unit(unit) => state.add_unit(contract, unit),
    }
}

// Releasing something not held is a no-op.
fn release(state: &mut UserState, contract: Address, ticket: DecodedId, quantity: u64) {
    match ticket {
        DecodedId::Type(ticket_type) => state.remove_fungible(contract, ticket_type.type_index, quantity),
        DecodedId::Unit(unit) => state.remove_unit(contract, unit),
    }
}

fn user_order(contract: Address, leg: &OrderLeg) -> UserOrder {
    UserOrder {
        event: contract,
        ticket_type: leg.ticket.ticket_type(),
        ticket_id: leg.ticket.unit().map(|u| u.unit_index),
        percentage: leg.percentage,
        quantity: leg.quantity,
    }
}

fn apply_order(state: &mut UserState, contract: Address, order: &OrderEvent) {
    let me = state.account;
    let is_maker = order.maker == me;
    let is_taker = order.taker == Some(me);

    for leg in &order.legs {
        let placed = user_order(contract, leg);
        match order.lifecycle {
            OrderLifecycle::Placed if is_maker => state.place_order(order.side, placed),
            OrderLifecycle::Withdrawn if is_maker => {
                state.remove_order(order.side, &placed);
            },
            OrderLifecycle::Filled => {
                // The seller of a sell order is its maker; the buyer of a buy order is.
                let (buyer, seller) = match order.side {
                    OrderSide::Sell => (is_taker, is_maker),
                    OrderSide::Buy => (is_maker, is_taker),
                };
                if is_maker
                    && !state.remove_order(order.side, &placed)
                    && order.side == OrderSide::Buy
                    && placed.ticket_id.is_some()
                {
                    // A unit may fill a buy order placed on the whole type.
                    state.remove_order(
                        order.side,
                        &UserOrder {
                            ticket_id: None,
                            ..placed
                        },
                    );
                }
                if buyer {
                    acquire(state, contract, leg.ticket, leg.quantity);
                }
                if seller {
                    release(state, contract, leg.ticket, leg.quantity);
                }
            },
            OrderLifecycle::Placed | OrderLifecycle::Withdrawn => {},
        }
    }
}

/// A [`UserState`] bundled with its reducer.
#[derive(Clone, Debug)]
pub struct UserAggregate {
    state: UserState,
    reducer: UserReducer,
}

impl UserAggregate {
    /// A fresh aggregate for `account`.
    #[must_use]
    pub const fn new(account: Address) -> Self {
        Self {
            state: UserState::new(account),
            reducer: UserReducer,
        }
    }

    /// Rebuild from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: UserSnapshot) -> Self {
        Self {
            state: UserState::from_snapshot(snapshot),
            reducer: UserReducer,
        }
    }

    /// Serializable form of the current state.
    #[must_use]
    pub fn to_snapshot(&self) -> UserSnapshot {
        self.state.to_snapshot()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &UserState {
        &self.state
    }

    /// The account.
    #[must_use]
    pub const fn account(&self) -> Address {
        self.state.account
    }

    /// Take the per-item failures recorded since the last call.
    pub fn drain_failures(&mut self) -> Vec<ItemFailure> {
        self.state.drain_failures()
    }

    /// Fold one action.
    pub fn send(&mut self, action: UserAction) -> SmallVec<[Effect<UserAction>; 4]> {
        self.reducer.reduce(&mut self.state, action, &())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use ticketsync_testing::{ReducerTest, assertions};

    fn me() -> Address {
        Address::repeat_byte(0x11)
    }

    fn other() -> Address {
        Address::repeat_byte(0x22)
    }

    fn event() -> Address {
        Address::repeat_byte(0xee)
    }

    fn replayed(block: u64, event: MarketplaceEvent) -> UserAction {
        UserAction::Replayed {
            contract: self::event(),
            position: LogPosition::new(block, 0),
            event,
        }
    }

    fn fill(side: OrderSide, maker: Address, taker: Address, ticket: DecodedId, quantity: u64) -> MarketplaceEvent {
        let kind = match (side, ticket) {
            (OrderSide::Sell, DecodedId::Type(_)) => EventKind::SellOrderFungibleFilled,
            (OrderSide::Sell, DecodedId::Unit(_)) => EventKind::SellOrderNonFungibleFilled,
            (OrderSide::Buy, DecodedId::Type(_)) => EventKind::BuyOrderFungibleFilled,
            (OrderSide::Buy, DecodedId::Unit(_)) => EventKind::BuyOrderNonFungibleFilled,
        };
        MarketplaceEvent::Order(OrderEvent {
            kind,
            side,
            lifecycle: OrderLifecycle::Filled,
            maker,
            taker: Some(taker),
            legs: vec![OrderLeg {
                ticket,
                percentage: 90,
                quantity,
            }],
        })
    }

    fn placed(side: OrderSide, ticket: DecodedId, quantity: u64) -> MarketplaceEvent {
        MarketplaceEvent::Order(OrderEvent {
            kind: match side {
                OrderSide::Buy => EventKind::BuyOrderPlaced,
                OrderSide::Sell => EventKind::SellOrderFungiblePlaced,
            },
            side,
            lifecycle: OrderLifecycle::Placed,
            maker: me(),
            taker: None,
            legs: vec![OrderLeg {
                ticket,
                percentage: 90,
                quantity,
            }],
        })
    }

    #[test]
    fn fungible_mint_creates_holding() {
        ReducerTest::new(UserReducer)
            .with_env(())
            .given_state(UserState::new(me()))
            .when_action(replayed(
                1,
                MarketplaceEvent::MintFungibles {
                    owner: me(),
                    ticket_type: TicketTypeId::fungible(3),
                    quantity: 5,
                },
            ))
            .then_state(|state| {
                assert_eq!(
                    state.fungible_holdings(),
                    &[FungibleHolding {
                        event: event(),
                        type_index: 3,
                        quantity: 5,
                    }]
                );
                assert!(state.owns_fungible(event(), 3, 5));
                assert!(!state.owns_fungible(event(), 3, 6));
            })
            .then_effects(|effects| assertions::assert_no_effects(effects))
            .run();
    }

    #[test]
    fn mints_merge_by_addition() {
        let mut state = UserState::new(me());
        for block in [1, 2] {
            UserReducer.reduce(
                &mut state,
                replayed(
                    block,
                    MarketplaceEvent::MintFungibles {
                        owner: me(),
                        ticket_type: TicketTypeId::fungible(3),
                        quantity: 2,
                    },
                ),
                &(),
            );
        }
        assert_eq!(state.fungible_holdings().len(), 1);
        assert_eq!(state.fungible_quantity(event(), 3), 4);
    }

    #[test]
    fn others_mint_is_ignored() {
        ReducerTest::new(UserReducer)
            .with_env(())
            .given_state(UserState::new(me()))
            .when_action(replayed(
                1,
                MarketplaceEvent::MintNonFungibles {
                    owner: other(),
                    units: vec![TicketUnitId::new(1, 1)],
                },
            ))
            .then_state(|state| assert!(state.non_fungible_holdings().is_empty()))
            .run();
    }

    #[test]
    fn selling_unheld_unit_is_noop() {
        ReducerTest::new(UserReducer)
            .with_env(())
            .given_state(UserState::new(me()))
            .when_action(replayed(
                4,
                MarketplaceEvent::TicketTransferred {
                    from: me(),
                    to: other(),
                    ticket: DecodedId::Unit(TicketUnitId::new(2, 7)),
                    quantity: 1,
                },
            ))
            .then_state(|state| {
                assert!(state.non_fungible_holdings().is_empty());
                assert!(state.clone().drain_failures().is_empty());
            })
            .run();
    }

    #[test]
    fn transfer_moves_fungible_quantity() {
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            replayed(
                1,
                MarketplaceEvent::MintFungibles {
                    owner: me(),
                    ticket_type: TicketTypeId::fungible(1),
                    quantity: 3,
                },
            ),
            &(),
        );
        UserReducer.reduce(
            &mut state,
            replayed(
                2,
                MarketplaceEvent::TicketTransferred {
                    from: me(),
                    to: other(),
                    ticket: DecodedId::Type(TicketTypeId::fungible(1)),
                    quantity: 3,
                },
            ),
            &(),
        );
        assert!(state.fungible_holdings().is_empty());
        assert_eq!(state.tickets_owned_for_event(event()), 0);
    }

    #[test]
    fn sell_fill_as_maker_releases_and_removes_order() {
        let ticket = DecodedId::Type(TicketTypeId::fungible(1));
        let mut state = UserState::new(me());
        for action in [
            replayed(
                1,
                MarketplaceEvent::MintFungibles {
                    owner: me(),
                    ticket_type: TicketTypeId::fungible(1),
                    quantity: 2,
                },
            ),
            replayed(2, placed(OrderSide::Sell, ticket, 1)),
        ] {
            UserReducer.reduce(&mut state, action, &());
        }
        assert_eq!(state.sell_orders(event(), TicketTypeId::fungible(1), None).len(), 1);

        UserReducer.reduce(&mut state, replayed(3, fill(OrderSide::Sell, me(), other(), ticket, 1)), &());
        assert!(state.sell_orders(event(), TicketTypeId::fungible(1), None).is_empty());
        assert_eq!(state.fungible_quantity(event(), 1), 1);
    }

    #[test]
    fn buy_fill_as_maker_acquires_unit() {
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            replayed(1, placed(OrderSide::Buy, DecodedId::Type(TicketTypeId::non_fungible(2)), 1)),
            &(),
        );
        assert_eq!(state.buy_orders(event()).len(), 1);

        let unit = TicketUnitId::new(2, 5);
        UserReducer.reduce(
            &mut state,
            replayed(2, fill(OrderSide::Buy, me(), other(), DecodedId::Unit(unit), 1)),
            &(),
        );
        assert!(state.buy_orders(event()).is_empty());
        assert!(state.owns_non_fungible(event(), unit).is_some());
        assert_eq!(state.tickets_owned_for_event(event()), 1);
    }

    #[test]
    fn buy_fill_as_taker_releases_unit() {
        let unit = TicketUnitId::new(2, 5);
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            replayed(
                1,
                MarketplaceEvent::MintNonFungibles {
                    owner: me(),
                    units: vec![unit],
                },
            ),
            &(),
        );
        UserReducer.reduce(
            &mut state,
            replayed(2, fill(OrderSide::Buy, other(), me(), DecodedId::Unit(unit), 1)),
            &(),
        );
        assert!(state.owns_non_fungible(event(), unit).is_none());
    }

    #[test]
    fn replacing_order_keeps_single_entry() {
        let ticket = DecodedId::Type(TicketTypeId::fungible(1));
        let mut state = UserState::new(me());
        UserReducer.reduce(&mut state, replayed(1, placed(OrderSide::Buy, ticket, 2)), &());
        UserReducer.reduce(&mut state, replayed(2, placed(OrderSide::Buy, ticket, 4)), &());
        let orders = state.buy_orders(event());
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].quantity, 4);
    }

    fn withdrawn(side: OrderSide, maker: Address, ticket: DecodedId, percentage: u64) -> MarketplaceEvent {
        let kind = match (side, ticket) {
            (OrderSide::Buy, _) => EventKind::BuyOrderWithdrawn,
            (OrderSide::Sell, DecodedId::Type(_)) => EventKind::SellOrderFungibleWithdrawn,
            (OrderSide::Sell, DecodedId::Unit(_)) => EventKind::SellOrderNonFungibleWithdrawn,
        };
        MarketplaceEvent::Order(OrderEvent {
            kind,
            side,
            lifecycle: OrderLifecycle::Withdrawn,
            maker,
            taker: None,
            legs: vec![OrderLeg {
                ticket,
                percentage,
                quantity: 1,
            }],
        })
    }

    #[test]
    fn buy_order_withdrawal_removes_it() {
        let ticket = DecodedId::Type(TicketTypeId::fungible(1));
        let mut state = UserState::new(me());
        UserReducer.reduce(&mut state, replayed(1, placed(OrderSide::Buy, ticket, 2)), &());
        assert_eq!(state.buy_orders(event()).len(), 1);

        UserReducer.reduce(&mut state, replayed(2, withdrawn(OrderSide::Buy, me(), ticket, 90)), &());
        assert!(state.buy_orders(event()).is_empty());
    }

    #[test]
    fn fungible_sell_withdrawal_keeps_the_tickets() {
        let ticket = DecodedId::Type(TicketTypeId::fungible(1));
        let mut state = UserState::new(me());
        for action in [
            replayed(
                1,
                MarketplaceEvent::MintFungibles {
                    owner: me(),
                    ticket_type: TicketTypeId::fungible(1),
                    quantity: 2,
                },
            ),
            replayed(2, placed(OrderSide::Sell, ticket, 2)),
            replayed(3, withdrawn(OrderSide::Sell, me(), ticket, 90)),
        ] {
            UserReducer.reduce(&mut state, action, &());
        }
        assert!(state.sell_orders(event(), TicketTypeId::fungible(1), None).is_empty());
        assert_eq!(state.fungible_quantity(event(), 1), 2);
    }

    #[test]
    fn unit_sell_withdrawal_removes_only_that_unit() {
        let first = TicketUnitId::new(1, 1);
        let second = TicketUnitId::new(1, 2);
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            replayed(
                1,
                MarketplaceEvent::MintNonFungibles {
                    owner: me(),
                    units: vec![first, second],
                },
            ),
            &(),
        );
        for unit in [first, second] {
            let mut order = placed(OrderSide::Sell, DecodedId::Unit(unit), 1);
            if let MarketplaceEvent::Order(inner) = &mut order {
                inner.kind = EventKind::SellOrderNonFungiblePlaced;
            }
            UserReducer.reduce(&mut state, replayed(2, order), &());
        }
        assert_eq!(state.sell_orders(event(), TicketTypeId::non_fungible(1), None).len(), 2);

        UserReducer.reduce(
            &mut state,
            replayed(3, withdrawn(OrderSide::Sell, me(), DecodedId::Unit(second), 90)),
            &(),
        );
        let left = state.sell_orders(event(), TicketTypeId::non_fungible(1), None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].ticket_id, Some(1));
        assert!(state.owns_non_fungible(event(), second).is_some());
    }

    #[test]
    fn withdrawals_of_absent_or_foreign_orders_are_noops() {
        let ticket = DecodedId::Type(TicketTypeId::fungible(1));
        let mut state = UserState::new(me());
        UserReducer.reduce(&mut state, replayed(1, placed(OrderSide::Buy, ticket, 2)), &());
        let before = state.clone();

        for event in [
            withdrawn(OrderSide::Buy, me(), ticket, 40),
            withdrawn(OrderSide::Buy, other(), ticket, 90),
            withdrawn(OrderSide::Sell, me(), ticket, 90),
        ] {
            UserReducer.reduce(&mut state, replayed(2, event), &());
        }
        assert_eq!(state, before);
    }

    #[test]
    fn approval_levels_per_approver() {
        let verifier = Address::repeat_byte(0x33);
        let mut aggregate = UserAggregate::new(me());
        assert_eq!(aggregate.state().approval_level(verifier), None);
        assert!(!aggregate.state().is_approved(verifier, 0));

        aggregate.send(UserAction::ApprovalLevelSet {
            approver: verifier,
            level: 2,
        });
        assert!(aggregate.state().is_approved(verifier, 1));
        assert!(aggregate.state().is_approved(verifier, 2));
        assert!(!aggregate.state().is_approved(verifier, 3));
        assert!(!aggregate.state().is_approved(other(), 1));

        aggregate.send(UserAction::ApprovalLevelSet {
            approver: verifier,
            level: 0,
        });
        assert_eq!(aggregate.state().approval_level(verifier), Some(0));
        assert!(!aggregate.state().is_approved(verifier, 0));
    }

    #[test]
    fn presale_lifecycle() {
        let ticket_type = TicketTypeId::fungible(1);
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            replayed(
                1,
                MarketplaceEvent::PresaleJoined {
                    addr: me(),
                    ticket_type,
                    lucky_number: 7,
                },
            ),
            &(),
        );
        assert_eq!(
            state.presale_state(event(), ticket_type),
            Some(PresaleState::Joined { lucky_number: 7 })
        );
        assert!(state.has_active_presale());

        UserReducer.reduce(
            &mut state,
            replayed(2, MarketplaceEvent::TicketClaimed { addr: me(), ticket_type }),
            &(),
        );
        assert_eq!(state.presale_state(event(), ticket_type), Some(PresaleState::Claimed));
        assert!(!state.has_active_presale());
    }

    #[test]
    fn checkpoints_are_per_contract() {
        let mut state = UserState::new(me());
        UserReducer.reduce(
            &mut state,
            UserAction::Synced {
                contract: event(),
                position: LogPosition::new(30, 2),
            },
            &(),
        );
        UserReducer.reduce(
            &mut state,
            UserAction::Synced {
                contract: event(),
                position: LogPosition::end_of_block(20),
            },
            &(),
        );
        assert_eq!(state.checkpoint(event()), LogPosition::new(30, 2));
        assert_eq!(state.last_synced_block(event()), 30);
        assert_eq!(state.checkpoint(other()), LogPosition::end_of_block(0));
    }

    #[test]
    fn snapshot_restores_state() {
        let mut aggregate = UserAggregate::new(me());
        aggregate.send(UserAction::BalanceUpdated { balance: 1_000 });
        aggregate.send(replayed(
            1,
            MarketplaceEvent::PresaleJoined {
                addr: me(),
                ticket_type: TicketTypeId::non_fungible(1),
                lucky_number: 3,
            },
        ));
        aggregate.send(UserAction::ApprovalLevelSet {
            approver: other(),
            level: 2,
        });
        aggregate.send(UserAction::Synced {
            contract: event(),
            position: LogPosition::end_of_block(9),
        });

        let json = serde_json::to_vec(&aggregate.to_snapshot()).unwrap();
        let restored = UserAggregate::from_snapshot(serde_json::from_slice(&json).unwrap());
        assert_eq!(restored.state(), aggregate.state());
        assert_eq!(restored.state().balance(), 1_000);
        assert!(restored.state().is_approved(other(), 2));
    }
}
