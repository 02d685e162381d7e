//! Event aggregate: one event contract's catalog, unit ownership and order books.
//!
//! The state is folded by [`EventReducer`] from replayed [`MarketplaceEvent`]s
//! and from catalog reads fed in as [`EventAction::TicketTypeDiscovered`].
//! Metadata announcements yield an [`Effect::Future`] that fetches the payload
//! from the [`ContentStore`] and feeds back a `*MetadataLoaded` or
//! [`EventAction::MetadataFetchFailed`] action.

use super::record_failure;
use crate::error::ItemFailure;
use crate::events::{MarketplaceEvent, OrderEvent, OrderLeg, OrderLifecycle};
use crate::inventory::{TicketType, TicketUnit};
use crate::metadata::{self, EventMetadata, TicketMetadata};
use crate::order_book::{Order, OrderBook, OrderKey, OrderSide};
use crate::types::{Address, DecodedId, TicketTypeId, TicketUnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use ticketsync_core::content_store::{ContentHash, ContentStore, ContentStoreError};
use ticketsync_core::contract::TicketTypeMeta;
use ticketsync_core::effect::Effect;
use ticketsync_core::position::LogPosition;
use ticketsync_core::reducer::Reducer;
use ticketsync_core::{SmallVec, smallvec};

/// A buy order annotated with where it rests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedOrder {
    /// Event contract.
    pub event: Address,
    /// Type whose book holds the order.
    pub ticket_type: TicketTypeId,
    /// The order.
    pub order: Order,
}

/// A metadata payload that still has to be loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataRequest {
    /// The event's own payload.
    Event(ContentHash),
    /// One ticket type's payload.
    Ticket(TicketTypeId, ContentHash),
}

/// Local model of one event contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventState {
    contract: Address,
    content_hash: Option<ContentHash>,
    loaded_hash: Option<ContentHash>,
    metadata: Option<EventMetadata>,
    fungible_types: BTreeMap<u64, TicketType>,
    non_fungible_types: BTreeMap<u64, TicketType>,
    checkpoint: LogPosition,
    failures: Vec<ItemFailure>,
}

impl EventState {
    /// A bare event, known only by its contract address.
    #[must_use]
    pub const fn new(contract: Address) -> Self {
        Self {
            contract,
            content_hash: None,
            loaded_hash: None,
            metadata: None,
            fungible_types: BTreeMap::new(),
            non_fungible_types: BTreeMap::new(),
            checkpoint: LogPosition::end_of_block(0),
            failures: Vec::new(),
        }
    }

    /// Event contract address.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// Loaded descriptive metadata.
    #[must_use]
    pub const fn metadata(&self) -> Option<&EventMetadata> {
        self.metadata.as_ref()
    }

    /// Hash of the latest announced event payload.
    #[must_use]
    pub const fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    /// Every entry at or before this position has been folded.
    #[must_use]
    pub const fn checkpoint(&self) -> LogPosition {
        self.checkpoint
    }

    /// Block of the checkpoint.
    #[must_use]
    pub const fn last_synced_block(&self) -> u64 {
        self.checkpoint.block_number
    }

    /// Fungible types in index order.
    pub fn fungible_types(&self) -> impl Iterator<Item = &TicketType> {
        self.fungible_types.values()
    }

    /// Non-fungible types in index order.
    pub fn non_fungible_types(&self) -> impl Iterator<Item = &TicketType> {
        self.non_fungible_types.values()
    }

    fn types(&self, is_fungible: bool) -> &BTreeMap<u64, TicketType> {
        if is_fungible {
            &self.fungible_types
        } else {
            &self.non_fungible_types
        }
    }

    fn types_mut(&mut self, is_fungible: bool) -> &mut BTreeMap<u64, TicketType> {
        if is_fungible {
            &mut self.fungible_types
        } else {
            &mut self.non_fungible_types
        }
    }

    /// A discovered ticket type.
    #[must_use]
    pub fn ticket_type(&self, type_id: TicketTypeId) -> Option<&TicketType> {
        self.types(type_id.is_fungible).get(&type_id.type_index)
    }

    fn ticket_type_mut(&mut self, type_id: TicketTypeId) -> Option<&mut TicketType> {
        self.types_mut(type_id.is_fungible).get_mut(&type_id.type_index)
    }

    /// One non-fungible unit, once it has been sold or carried an order.
    #[must_use]
    pub fn nf_unit(&self, unit: TicketUnitId) -> Option<&TicketUnit> {
        self.ticket_type(unit.ticket_type())?.unit(unit.unit_index)
    }

    /// Owner of a non-fungible unit, [`NULL_ADDRESS`](crate::types::NULL_ADDRESS) if unsold.
    #[must_use]
    pub fn nf_owner(&self, unit: TicketUnitId) -> Option<Address> {
        self.ticket_type(unit.ticket_type())?.owner(unit.unit_index)
    }

    fn has_unit(&self, unit: TicketUnitId) -> bool {
        self.ticket_type(unit.ticket_type())
            .is_some_and(|t| t.has_unit(unit.unit_index))
    }

    /// Whether a sell order rests on the type, or on one of its units.
    #[must_use]
    pub fn has_sell_orders(&self, type_id: TicketTypeId, unit_index: Option<u64>) -> bool {
        self.ticket_type(type_id)
            .is_some_and(|t| t.has_sell_orders(unit_index))
    }

    /// Cheapest sell order on the type, or on one of its units.
    #[must_use]
    pub fn lowest_sell_order(&self, type_id: TicketTypeId, unit_index: Option<u64>) -> Option<&Order> {
        self.ticket_type(type_id)?.lowest_sell_order(unit_index)
    }

    /// Sell orders placed by `address` on the type, or on one of its units.
    #[must_use]
    pub fn sell_orders_by_address(
        &self,
        address: Address,
        type_id: TicketTypeId,
        unit_index: Option<u64>,
    ) -> Vec<&Order> {
        let Some(ticket_type) = self.ticket_type(type_id) else {
            return Vec::new();
        };
        let book = match unit_index {
            Some(index) => match ticket_type.unit(index) {
                Some(unit) => &unit.order_book,
                None => return Vec::new(),
            },
            None => &ticket_type.order_book,
        };
        book.orders_by_address(OrderSide::Sell, address)
    }

    /// Buy orders placed by `address` across all fungible or all non-fungible types.
    #[must_use]
    pub fn buy_orders_by_address(&self, address: Address, is_fungible: bool) -> Vec<AnnotatedOrder> {
        self.types(is_fungible)
            .values()
            .flat_map(|t| {
                t.order_book
                    .orders_by_address(OrderSide::Buy, address)
                    .into_iter()
                    .map(|order| AnnotatedOrder {
                        event: self.contract,
                        ticket_type: t.type_id,
                        order: order.clone(),
                    })
            })
            .collect()
    }

    /// Aftermarket percentage step of a type.
    #[must_use]
    pub fn granularity(&self, type_id: TicketTypeId) -> Option<u64> {
        self.ticket_type(type_id).map(|t| t.aftermarket_granularity)
    }

    /// Whether the type (or one of its units) can still be bought from the organizer.
    #[must_use]
    pub fn is_available(&self, type_id: TicketTypeId, unit_index: Option<u64>) -> bool {
        self.ticket_type(type_id)
            .is_some_and(|t| t.is_available(unit_index))
    }

    /// Cheapest face price over all types.
    #[must_use]
    pub fn lowest_price(&self) -> Option<u128> {
        self.fungible_types()
            .chain(self.non_fungible_types())
            .map(|t| t.price)
            .min()
    }

    /// Start time from the loaded metadata.
    #[must_use]
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref()?.starts_at()
    }

    /// Announced payloads that have not been loaded yet.
    #[must_use]
    pub fn pending_metadata(&self) -> Vec<MetadataRequest> {
        let event = self
            .content_hash
            .as_ref()
            .filter(|hash| self.loaded_hash.as_ref() != Some(*hash))
            .map(|hash| MetadataRequest::Event(hash.clone()));
        let tickets = self
            .fungible_types()
            .chain(self.non_fungible_types())
            .filter_map(|t| {
                t.pending_metadata()
                    .map(|hash| MetadataRequest::Ticket(t.type_id, hash.clone()))
            });
        event.into_iter().chain(tickets).collect()
    }

    /// Take the per-item failures recorded since the last call.
    pub fn drain_failures(&mut self) -> Vec<ItemFailure> {
        std::mem::take(&mut self.failures)
    }

    fn fail(&mut self, failure: ItemFailure) {
        record_failure(&mut self.failures, self.contract, failure);
    }

    fn discover(&mut self, type_id: TicketTypeId, meta: TicketTypeMeta, granularity: u64) {
        let contract = self.contract;
        match self.ticket_type_mut(type_id) {
            Some(known) => {
                known.update_catalog(meta.price, meta.supply, granularity);
                tracing::debug!(contract = %contract, ticket_type = %type_id, "Ticket type refreshed");
            },
            None => {
                let ticket_type = TicketType::new(type_id, contract, meta.price, meta.supply, granularity);
                self.types_mut(type_id.is_fungible)
                    .insert(type_id.type_index, ticket_type);
                tracing::info!(contract = %contract, ticket_type = %type_id, supply = meta.supply, "Ticket type discovered");
            },
        }
    }

    /// Serializable form of this state.
    #[must_use]
    pub fn to_snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            contract: self.contract,
            content_hash: self.content_hash.clone(),
            loaded_hash: self.loaded_hash.clone(),
            metadata: self.metadata.clone(),
            ticket_types: self
                .fungible_types()
                .chain(self.non_fungible_types())
                .cloned()
                .collect(),
            checkpoint: self.checkpoint,
        }
    }

    /// Rebuild a state from its snapshot without re-running discovery.
    #[must_use]
    pub fn from_snapshot(snapshot: EventSnapshot) -> Self {
        let mut state = Self::new(snapshot.contract);
        state.content_hash = snapshot.content_hash;
        state.loaded_hash = snapshot.loaded_hash;
        state.metadata = snapshot.metadata;
        state.checkpoint = snapshot.checkpoint;
        for ticket_type in snapshot.ticket_types {
            state
                .types_mut(ticket_type.type_id.is_fungible)
                .insert(ticket_type.type_id.type_index, ticket_type);
        }
        state
    }
}

/// Serializable form of an [`EventState`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Event contract.
    pub contract: Address,
    /// Latest announced event payload.
    pub content_hash: Option<ContentHash>,
    /// Payload the metadata was loaded from.
    pub loaded_hash: Option<ContentHash>,
    /// Loaded metadata.
    pub metadata: Option<EventMetadata>,
    /// Fungible then non-fungible types.
    pub ticket_types: Vec<TicketType>,
    /// Position everything was folded up to.
    pub checkpoint: LogPosition,
}

/// Inputs of the [`EventReducer`].
#[derive(Clone, Debug)]
pub enum EventAction {
    /// A log entry emitted by this event's contract.
    Replayed {
        /// Where the entry was emitted.
        position: LogPosition,
        /// Normalized entry.
        event: MarketplaceEvent,
    },
    /// Catalog data read from the contract.
    TicketTypeDiscovered {
        /// The type.
        type_id: TicketTypeId,
        /// Price and supply.
        meta: TicketTypeMeta,
        /// Aftermarket step of the contract.
        granularity: u64,
    },
    /// Event payload fetched and parsed.
    EventMetadataLoaded {
        /// Payload hash.
        content_hash: ContentHash,
        /// Parsed payload.
        metadata: EventMetadata,
    },
    /// Ticket type payload fetched and parsed.
    TicketMetadataLoaded {
        /// Described type.
        ticket_type: TicketTypeId,
        /// Payload hash.
        content_hash: ContentHash,
        /// Parsed payload.
        metadata: TicketMetadata,
    },
    /// A payload could not be fetched or parsed.
    MetadataFetchFailed {
        /// Payload hash.
        content_hash: ContentHash,
        /// Failure description.
        reason: String,
    },
    /// Fetch again every announced payload that is not loaded.
    RetryMetadata,
    /// Every entry up to `position` has been folded.
    Synced {
        /// New checkpoint.
        position: LogPosition,
    },
}

/// Collaborators of the [`EventReducer`].
#[derive(Clone)]
pub struct EventEnvironment {
    /// Payload source.
    pub content_store: Arc<dyn ContentStore>,
    /// Per-payload fetch timeout.
    pub content_timeout: Duration,
}

impl EventEnvironment {
    /// Create an environment.
    #[must_use]
    pub fn new(content_store: Arc<dyn ContentStore>, content_timeout: Duration) -> Self {
        Self {
            content_store,
            content_timeout,
        }
    }
}

/// Folds [`EventAction`]s into an [`EventState`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EventReducer;

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Environment = EventEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            EventAction::Replayed { position, event } => apply_replayed(state, position, event, env),
            EventAction::TicketTypeDiscovered {
                type_id,
                meta,
                granularity,
            } => {
                state.discover(type_id, meta, granularity);
                smallvec![Effect::None]
            },
            EventAction::EventMetadataLoaded {
                content_hash,
                metadata,
            } => {
                tracing::info!(contract = %state.contract, hash = %content_hash, title = %metadata.title, "Event metadata loaded");
                state.content_hash = Some(content_hash.clone());
                state.loaded_hash = Some(content_hash);
                state.metadata = Some(metadata);
                smallvec![Effect::None]
            },
            EventAction::TicketMetadataLoaded {
                ticket_type,
                content_hash,
                metadata,
            } => {
                match state.ticket_type_mut(ticket_type) {
                    Some(known) => known.attach_metadata(content_hash, metadata),
                    None => {
                        tracing::debug!(contract = %state.contract, ticket_type = %ticket_type, "Metadata for a type that is gone");
                    },
                }
                smallvec![Effect::None]
            },
            EventAction::MetadataFetchFailed {
                content_hash,
                reason,
            } => {
                state.fail(ItemFailure::ContentFetchFailure {
                    hash: content_hash,
                    reason,
                });
                smallvec![Effect::None]
            },
            EventAction::RetryMetadata => state
                .pending_metadata()
                .into_iter()
                .map(|request| fetch_metadata(env, request))
                .collect(),
            EventAction::Synced { position } => {
                state.checkpoint = state.checkpoint.max(position);
                smallvec![Effect::None]
            },
        }
    }
}

fn apply_replayed(
    state: &mut EventState,
    position: LogPosition,
    event: MarketplaceEvent,
    env: &EventEnvironment,
) -> SmallVec<[Effect<EventAction>; 4]> {
    match event {
        MarketplaceEvent::EventMetadata { content_hash } => {
            let unchanged = state.loaded_hash.as_ref() == Some(&content_hash);
            state.content_hash = Some(content_hash.clone());
            if unchanged {
                tracing::debug!(contract = %state.contract, hash = %content_hash, "Event metadata unchanged");
                return smallvec![Effect::None];
            }
            smallvec![fetch_metadata(env, MetadataRequest::Event(content_hash))]
        },
        MarketplaceEvent::TicketMetadata {
            ticket_type,
            content_hash,
        } => {
            let contract = state.contract;
            let Some(known) = state.ticket_type_mut(ticket_type) else {
                state.fail(ItemFailure::UnknownTicketType {
                    position,
                    ticket_type,
                });
                return smallvec![Effect::None];
            };
            if !known.announce_metadata(content_hash.clone()) {
                tracing::debug!(contract = %contract, ticket_type = %ticket_type, "Ticket metadata unchanged");
                return smallvec![Effect::None];
            }
            smallvec![fetch_metadata(
                env,
                MetadataRequest::Ticket(ticket_type, content_hash)
            )]
        },
        MarketplaceEvent::MintFungibles {
            ticket_type,
            quantity,
            ..
        } => {
            if !ticket_type.is_fungible {
                state.fail(ItemFailure::Malformed {
                    position,
                    kind: "MintFungibles".to_string(),
                    reason: "minted type is not fungible".to_string(),
                });
                return smallvec![Effect::None];
            }
            let Some(known) = state.ticket_type_mut(ticket_type) else {
                state.fail(ItemFailure::UnknownTicketType {
                    position,
                    ticket_type,
                });
                return smallvec![Effect::None];
            };
            if let Err(source) = known.record_sale(quantity) {
                state.fail(ItemFailure::StaleSupply { position, source });
            }
            smallvec![Effect::None]
        },
        MarketplaceEvent::MintNonFungibles { owner, units } => {
            if let Some(missing) = first_unknown_type(state, units.iter().map(TicketUnitId::ticket_type)) {
                state.fail(ItemFailure::UnknownTicketType {
                    position,
                    ticket_type: missing,
                });
                return smallvec![Effect::None];
            }
            let mut clamped = Vec::new();
            for unit in &units {
                if let Some(known) = state.ticket_type_mut(unit.ticket_type()) {
                    if let Err(source) = known.record_sale(1) {
                        clamped.push(source);
                    }
                    known.upsert_unit(unit.unit_index, owner);
                }
            }
            for source in clamped {
                state.fail(ItemFailure::StaleSupply { position, source });
            }
            smallvec![Effect::None]
        },
        MarketplaceEvent::Order(order) => {
            apply_order(state, position, &order);
            smallvec![Effect::None]
        },
        MarketplaceEvent::TicketTransferred { to, ticket, .. } => {
            if let DecodedId::Unit(unit) = ticket {
                match state.ticket_type_mut(unit.ticket_type()) {
                    Some(known) => {
                        known.upsert_unit(unit.unit_index, to);
                    },
                    None => state.fail(ItemFailure::UnknownTicketType {
                        position,
                        ticket_type: unit.ticket_type(),
                    }),
                }
            }
            smallvec![Effect::None]
        },
        MarketplaceEvent::PresaleJoined { .. }
        | MarketplaceEvent::TicketClaimed { .. }
        | MarketplaceEvent::TicketPriceRefunded { .. } => smallvec![Effect::None],
    }
}

fn first_unknown_type(
    state: &EventState,
    mut types: impl Iterator<Item = TicketTypeId>,
) -> Option<TicketTypeId> {
    types.find(|t| state.ticket_type(*t).is_none())
}

// The whole entry is validated before any leg is applied.
fn apply_order(state: &mut EventState, position: LogPosition, order: &OrderEvent) {
    if let Some(missing) = first_unknown_type(state, order.legs.iter().map(|leg| leg.ticket.ticket_type())) {
        state.fail(ItemFailure::UnknownTicketType {
            position,
            ticket_type: missing,
        });
        return;
    }
    let missing_unit = order.legs.iter().find_map(|leg| {
        let unit = leg.ticket.unit()?;
        (!state.has_unit(unit)).then_some(unit)
    });
    if let Some(unit) = missing_unit {
        state.fail(ItemFailure::Malformed {
            position,
            kind: order.kind.to_string(),
            reason: format!("unit {unit} is not part of the catalog"),
        });
        return;
    }

    for leg in &order.legs {
        if let Some(known) = state.ticket_type_mut(leg.ticket.ticket_type()) {
            apply_leg(known, order, leg);
        }
    }
}

fn apply_leg(ticket_type: &mut TicketType, order: &OrderEvent, leg: &OrderLeg) {
    match (leg.ticket, order.side) {
        // Unit sell orders rest on the unit's own book.
        (DecodedId::Unit(unit), OrderSide::Sell) => {
            if let Some(ticket_unit) = ticket_type.unit_mut(unit.unit_index) {
                apply_to_book(&mut ticket_unit.order_book, order, leg, Some(unit.unit_index));
            }
        },
        (ticket, _) => {
            let ticket_id = ticket.unit().map(|u| u.unit_index);
            apply_to_book(&mut ticket_type.order_book, order, leg, ticket_id);
        },
    }

    if order.lifecycle == OrderLifecycle::Filled {
        if let DecodedId::Unit(unit) = leg.ticket {
            let buyer = match order.side {
                OrderSide::Sell => order.taker,
                OrderSide::Buy => Some(order.maker),
            };
            if let Some(buyer) = buyer {
                ticket_type.upsert_unit(unit.unit_index, buyer);
            }
        }
    }
}

fn apply_to_book(book: &mut OrderBook, order: &OrderEvent, leg: &OrderLeg, ticket_id: Option<u64>) {
    let key = OrderKey {
        address: order.maker,
        percentage: leg.percentage,
        ticket_id,
    };
    match order.lifecycle {
        OrderLifecycle::Placed => {
            book.add(
                order.side,
                Order {
                    address: order.maker,
                    percentage: leg.percentage,
                    quantity: leg.quantity,
                    ticket_id,
                },
            );
        },
        OrderLifecycle::Filled | OrderLifecycle::Withdrawn => {
            let mut removed = book.remove(order.side, &key);
            // A unit may fill a buy order placed on the whole type.
            if removed.is_none()
                && order.lifecycle == OrderLifecycle::Filled
                && order.side == OrderSide::Buy
                && ticket_id.is_some()
            {
                removed = book.remove(
                    order.side,
                    &OrderKey {
                        ticket_id: None,
                        ..key
                    },
                );
            }
            if removed.is_none() {
                tracing::debug!(maker = %order.maker, percentage = leg.percentage, side = %order.side, "No matching order to remove");
            }
        },
    }
}

fn fetch_metadata(env: &EventEnvironment, request: MetadataRequest) -> Effect<EventAction> {
    let store = Arc::clone(&env.content_store);
    let timeout = env.content_timeout;
    Effect::future(async move {
        let action = match request {
            MetadataRequest::Event(content_hash) => {
                match fetch_payload(store.as_ref(), &content_hash, timeout)
                    .await
                    .and_then(|bytes| metadata::parse_event_metadata(&bytes).map_err(|e| e.to_string()))
                {
                    Ok(metadata) => EventAction::EventMetadataLoaded {
                        content_hash,
                        metadata,
                    },
                    Err(reason) => EventAction::MetadataFetchFailed {
                        content_hash,
                        reason,
                    },
                }
            },
            MetadataRequest::Ticket(ticket_type, content_hash) => {
                match fetch_payload(store.as_ref(), &content_hash, timeout)
                    .await
                    .and_then(|bytes| metadata::parse_ticket_metadata(&bytes).map_err(|e| e.to_string()))
                {
                    Ok(metadata) => EventAction::TicketMetadataLoaded {
                        ticket_type,
                        content_hash,
                        metadata,
                    },
                    Err(reason) => EventAction::MetadataFetchFailed {
                        content_hash,
                        reason,
                    },
                }
            },
        };
        Some(action)
    })
}

async fn fetch_payload(
    store: &dyn ContentStore,
    hash: &ContentHash,
    timeout: Duration,
) -> Result<Vec<u8>, String> {
    match tokio::time::timeout(timeout, store.fetch(hash, timeout)).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(ContentStoreError::Timeout {
            hash: hash.clone(),
            timeout,
        }
        .to_string()),
    }
}

/// An [`EventState`] bundled with its reducer and collaborators.
pub struct EventAggregate {
    state: EventState,
    reducer: EventReducer,
    environment: EventEnvironment,
}

impl EventAggregate {
    /// A bare event for `contract`.
    #[must_use]
    pub fn new(contract: Address, environment: EventEnvironment) -> Self {
        Self {
            state: EventState::new(contract),
            reducer: EventReducer,
            environment,
        }
    }

    /// Rebuild from a snapshot without re-running discovery.
    #[must_use]
    pub fn from_snapshot(snapshot: EventSnapshot, environment: EventEnvironment) -> Self {
        Self {
            state: EventState::from_snapshot(snapshot),
            reducer: EventReducer,
            environment,
        }
    }

    /// Serializable form of the current state.
    #[must_use]
    pub fn to_snapshot(&self) -> EventSnapshot {
        self.state.to_snapshot()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &EventState {
        &self.state
    }

    /// Event contract address.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.state.contract
    }

    /// Take the per-item failures recorded since the last call.
    pub fn drain_failures(&mut self) -> Vec<ItemFailure> {
        self.state.drain_failures()
    }

    /// Fold one action; the returned effects are for the caller to drive.
    pub fn send(&mut self, action: EventAction) -> SmallVec<[Effect<EventAction>; 4]> {
        self.reducer.reduce(&mut self.state, action, &self.environment)
    }
}
