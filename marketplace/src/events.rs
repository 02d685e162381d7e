//! Typed marketplace events normalized from raw ledger logs.
//!
//! [`decode_log`] turns a [`LogEntry`] into a [`MarketplaceEvent`]. Every
//! aftermarket log (`{Buy,Sell}Order*{Placed,Filled,Withdrawn}`) becomes an
//! [`OrderEvent`] with a side, a lifecycle step, the owner of the resting
//! order (`maker`) and, for fills, the account that took it (`taker`).

use crate::codec::{self, CodecError};
use crate::metadata::{self, MetadataError};
use crate::order_book::OrderSide;
use crate::types::{Address, DecodedId, TicketTypeId, TicketUnitId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ticketsync_core::content_store::ContentHash;
use ticketsync_core::event::{Event, EventError, LogEntry};

/// Why a log entry could not be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The event name is not one this crate knows.
    #[error("Unknown event kind: {0}")]
    UnknownEventKind(String),

    /// A return value is missing or malformed.
    #[error(transparent)]
    Field(#[from] EventError),

    /// A ticket identifier does not follow the id layout.
    #[error(transparent)]
    Identifier(#[from] CodecError),

    /// The announced content hash is inconsistent.
    #[error(transparent)]
    ContentHash(#[from] MetadataError),

    /// Parallel arrays of a batched log differ in length.
    #[error("{event_kind}: {left} has {left_len} items but {right} has {right_len}")]
    LengthMismatch {
        /// Event name.
        event_kind: String,
        /// First field.
        left: &'static str,
        /// Its length.
        left_len: usize,
        /// Second field.
        right: &'static str,
        /// Its length.
        right_len: usize,
    },
}

/// Every ledger event name this crate understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Event metadata announced.
    EventMetadata,
    /// Ticket type metadata announced.
    TicketMetadata,
    /// Fungible tickets minted.
    MintFungibles,
    /// Non-fungible units minted.
    MintNonFungibles,
    /// Buy order placed.
    BuyOrderPlaced,
    /// Buy order withdrawn.
    BuyOrderWithdrawn,
    /// Fungible buy order filled by a seller.
    BuyOrderFungibleFilled,
    /// Non-fungible buy order filled by a seller.
    BuyOrderNonFungibleFilled,
    /// Fungible sell order placed.
    SellOrderFungiblePlaced,
    /// Fungible sell order withdrawn.
    SellOrderFungibleWithdrawn,
    /// Fungible sell order filled by a buyer.
    SellOrderFungibleFilled,
    /// Non-fungible sell orders placed.
    SellOrderNonFungiblePlaced,
    /// Non-fungible sell orders withdrawn.
    SellOrderNonFungibleWithdrawn,
    /// Non-fungible sell orders filled by a buyer.
    SellOrderNonFungibleFilled,
    /// Presale joined.
    PresaleJoined,
    /// Presale ticket claimed.
    TicketClaimed,
    /// Presale price refunded.
    TicketPriceRefunded,
    /// Ticket transferred between accounts.
    TicketTransferred,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 18] = [
        Self::EventMetadata,
        Self::TicketMetadata,
        Self::MintFungibles,
        Self::MintNonFungibles,
        Self::BuyOrderPlaced,
        Self::BuyOrderWithdrawn,
        Self::BuyOrderFungibleFilled,
        Self::BuyOrderNonFungibleFilled,
        Self::SellOrderFungiblePlaced,
        Self::SellOrderFungibleWithdrawn,
        Self::SellOrderFungibleFilled,
        Self::SellOrderNonFungiblePlaced,
        Self::SellOrderNonFungibleWithdrawn,
        Self::SellOrderNonFungibleFilled,
        Self::PresaleJoined,
        Self::TicketClaimed,
        Self::TicketPriceRefunded,
        Self::TicketTransferred,
    ];

    /// The ledger's name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EventMetadata => "EventMetadata",
            Self::TicketMetadata => "TicketMetadata",
            Self::MintFungibles => "MintFungibles",
            Self::MintNonFungibles => "MintNonFungibles",
            Self::BuyOrderPlaced => "BuyOrderPlaced",
            Self::BuyOrderWithdrawn => "BuyOrderWithdrawn",
            Self::BuyOrderFungibleFilled => "BuyOrderFungibleFilled",
            Self::BuyOrderNonFungibleFilled => "BuyOrderNonFungibleFilled",
            Self::SellOrderFungiblePlaced => "SellOrderFungiblePlaced",
            Self::SellOrderFungibleWithdrawn => "SellOrderFungibleWithdrawn",
            Self::SellOrderFungibleFilled => "SellOrderFungibleFilled",
            Self::SellOrderNonFungiblePlaced => "SellOrderNonFungiblePlaced",
            Self::SellOrderNonFungibleWithdrawn => "SellOrderNonFungibleWithdrawn",
            Self::SellOrderNonFungibleFilled => "SellOrderNonFungibleFilled",
            Self::PresaleJoined => "PresaleJoined",
            Self::TicketClaimed => "TicketClaimed",
            Self::TicketPriceRefunded => "TicketPriceRefunded",
            Self::TicketTransferred => "TicketTransferred",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownEventKind(s.to_string()))
    }
}

/// Step of an aftermarket order's life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderLifecycle {
    /// Order entered the book.
    Placed,
    /// Order was taken by a counterparty.
    Filled,
    /// Order was cancelled by its maker.
    Withdrawn,
}

/// One ticket (type or unit) touched by an order event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Ticket type, or non-fungible unit.
    pub ticket: DecodedId,
    /// Price as a percentage of face value.
    pub percentage: u64,
    /// Number of tickets (1 for a unit).
    pub quantity: u64,
}

/// A normalized aftermarket log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Emitted event name.
    pub kind: EventKind,
    /// Book side the order rests on.
    pub side: OrderSide,
    /// Lifecycle step.
    pub lifecycle: OrderLifecycle,
    /// Owner of the resting order.
    pub maker: Address,
    /// Account that filled the order, for fills.
    pub taker: Option<Address>,
    /// Tickets concerned, one leg per unit for batched non-fungible logs.
    pub legs: Vec<OrderLeg>,
}

/// A typed marketplace event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketplaceEvent {
    /// Event metadata announced under a content hash.
    EventMetadata {
        /// Hash of the payload.
        content_hash: ContentHash,
    },
    /// Ticket type metadata announced (or changed).
    TicketMetadata {
        /// Type described.
        ticket_type: TicketTypeId,
        /// Hash of the payload.
        content_hash: ContentHash,
    },
    /// Fungible tickets minted to `owner`.
    MintFungibles {
        /// Buyer.
        owner: Address,
        /// Fungible type.
        ticket_type: TicketTypeId,
        /// Number of tickets.
        quantity: u64,
    },
    /// Non-fungible units minted to `owner`.
    MintNonFungibles {
        /// Buyer.
        owner: Address,
        /// Units minted.
        units: Vec<TicketUnitId>,
    },
    /// Aftermarket order placed, filled or withdrawn.
    Order(OrderEvent),
    /// Account joined a presale.
    PresaleJoined {
        /// Participant.
        addr: Address,
        /// Type on presale.
        ticket_type: TicketTypeId,
        /// Drawn number.
        lucky_number: u64,
    },
    /// Presale winner claimed the ticket.
    TicketClaimed {
        /// Participant.
        addr: Address,
        /// Type on presale.
        ticket_type: TicketTypeId,
    },
    /// Presale loser got the price back.
    TicketPriceRefunded {
        /// Participant.
        addr: Address,
        /// Type on presale.
        ticket_type: TicketTypeId,
    },
    /// Tickets moved between accounts outside the aftermarket.
    TicketTransferred {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Fungible type or non-fungible unit.
        ticket: DecodedId,
        /// Number of tickets (1 for a unit).
        quantity: u64,
    },
}

impl MarketplaceEvent {
    /// Kind this event was normalized from.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::EventMetadata { .. } => EventKind::EventMetadata,
            Self::TicketMetadata { .. } => EventKind::TicketMetadata,
            Self::MintFungibles { .. } => EventKind::MintFungibles,
            Self::MintNonFungibles { .. } => EventKind::MintNonFungibles,
            Self::Order(order) => order.kind,
            Self::PresaleJoined { .. } => EventKind::PresaleJoined,
            Self::TicketClaimed { .. } => EventKind::TicketClaimed,
            Self::TicketPriceRefunded { .. } => EventKind::TicketPriceRefunded,
            Self::TicketTransferred { .. } => EventKind::TicketTransferred,
        }
    }

    /// Whether `account` takes part in this event.
    #[must_use]
    pub fn concerns(&self, account: Address) -> bool {
        self.participants().contains(&account)
    }
}

impl Event for MarketplaceEvent {
    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn participants(&self) -> Vec<Address> {
        match self {
            Self::EventMetadata { .. } | Self::TicketMetadata { .. } => Vec::new(),
            Self::MintFungibles { owner, .. } | Self::MintNonFungibles { owner, .. } => vec![*owner],
            Self::Order(order) => std::iter::once(order.maker).chain(order.taker).collect(),
            Self::PresaleJoined { addr, .. }
            | Self::TicketClaimed { addr, .. }
            | Self::TicketPriceRefunded { addr, .. } => vec![*addr],
            Self::TicketTransferred { from, to, .. } => vec![*from, *to],
        }
    }
}

/// Normalize a raw log entry.
///
/// # Errors
///
/// Returns [`DecodeError::UnknownEventKind`] for names this crate does not
/// know, and another [`DecodeError`] variant when a known log is malformed.
pub fn decode_log(entry: &LogEntry) -> Result<MarketplaceEvent, DecodeError> {
    let kind: EventKind = entry.event_kind.parse()?;
    let event = match kind {
        EventKind::EventMetadata => MarketplaceEvent::EventMetadata {
            content_hash: announced_hash(entry)?,
        },
        EventKind::TicketMetadata => MarketplaceEvent::TicketMetadata {
            ticket_type: codec::decode_type(entry.uint_value("ticketTypeId")?)?,
            content_hash: announced_hash(entry)?,
        },
        EventKind::MintFungibles => MarketplaceEvent::MintFungibles {
            owner: entry.address_value("owner")?,
            ticket_type: codec::decode_type(entry.uint_value("ticketType")?)?,
            quantity: entry.u64_value("quantity")?,
        },
        EventKind::MintNonFungibles => MarketplaceEvent::MintNonFungibles {
            owner: entry.address_value("owner")?,
            units: entry
                .uint_list_value("ids")?
                .into_iter()
                .map(codec::decode_unit)
                .collect::<Result<_, _>>()?,
        },
        EventKind::BuyOrderPlaced => single_leg_order(entry, kind, OrderSide::Buy, OrderLifecycle::Placed, None)?,
        EventKind::BuyOrderWithdrawn => {
            single_leg_order(entry, kind, OrderSide::Buy, OrderLifecycle::Withdrawn, None)?
        },
        EventKind::BuyOrderFungibleFilled => {
            single_leg_order(entry, kind, OrderSide::Buy, OrderLifecycle::Filled, Some("buyer"))?
        },
        EventKind::SellOrderFungiblePlaced => {
            single_leg_order(entry, kind, OrderSide::Sell, OrderLifecycle::Placed, None)?
        },
        EventKind::SellOrderFungibleWithdrawn => {
            single_leg_order(entry, kind, OrderSide::Sell, OrderLifecycle::Withdrawn, None)?
        },
        EventKind::SellOrderFungibleFilled => {
            single_leg_order(entry, kind, OrderSide::Sell, OrderLifecycle::Filled, Some("seller"))?
        },
        EventKind::BuyOrderNonFungibleFilled => {
            unit_batch_order(entry, kind, OrderSide::Buy, OrderLifecycle::Filled, Some("buyer"))?
        },
        EventKind::SellOrderNonFungiblePlaced => {
            unit_batch_order(entry, kind, OrderSide::Sell, OrderLifecycle::Placed, None)?
        },
        EventKind::SellOrderNonFungibleWithdrawn => {
            unit_batch_order(entry, kind, OrderSide::Sell, OrderLifecycle::Withdrawn, None)?
        },
        EventKind::SellOrderNonFungibleFilled => {
            unit_batch_order(entry, kind, OrderSide::Sell, OrderLifecycle::Filled, Some("seller"))?
        },
        EventKind::PresaleJoined => MarketplaceEvent::PresaleJoined {
            addr: entry.address_value("addr")?,
            ticket_type: codec::decode_type(entry.uint_value("ticketType")?)?,
            lucky_number: entry.u64_value("luckyNumber")?,
        },
        EventKind::TicketClaimed => MarketplaceEvent::TicketClaimed {
            addr: entry.address_value("addr")?,
            ticket_type: codec::decode_type(entry.uint_value("ticketType")?)?,
        },
        EventKind::TicketPriceRefunded => MarketplaceEvent::TicketPriceRefunded {
            addr: entry.address_value("addr")?,
            ticket_type: codec::decode_type(entry.uint_value("ticketType")?)?,
        },
        EventKind::TicketTransferred => {
            let ticket = codec::decode(entry.uint_value("id")?)?;
            let quantity = match ticket {
                DecodedId::Unit(_) => 1,
                DecodedId::Type(_) => entry.u64_value("quantity")?,
            };
            MarketplaceEvent::TicketTransferred {
                from: entry.address_value("from")?,
                to: entry.address_value("to")?,
                ticket,
                quantity,
            }
        },
    };
    Ok(event)
}

fn announced_hash(entry: &LogEntry) -> Result<ContentHash, DecodeError> {
    let hash_function = narrow(entry, "hashFunction")?;
    let size = narrow(entry, "size")?;
    let digest = entry.value("digest")?;
    let digest = digest.as_str().ok_or_else(|| EventError::MalformedField {
        event_kind: entry.event_kind.clone(),
        field: "digest".to_string(),
        reason: "expected a hex string".to_string(),
    })?;
    Ok(metadata::content_hash(hash_function, size, digest)?)
}

fn narrow(entry: &LogEntry, field: &str) -> Result<u8, DecodeError> {
    let value = entry.u64_value(field)?;
    u8::try_from(value).map_err(|_| {
        DecodeError::Field(EventError::MalformedField {
            event_kind: entry.event_kind.clone(),
            field: field.to_string(),
            reason: format!("{value} does not fit in one byte"),
        })
    })
}

// `ticketType` carries either a type id or, for orders on one unit, a unit id.
fn single_leg_order(
    entry: &LogEntry,
    kind: EventKind,
    side: OrderSide,
    lifecycle: OrderLifecycle,
    maker_field: Option<&'static str>,
) -> Result<MarketplaceEvent, DecodeError> {
    let addr = entry.address_value("addr")?;
    let (maker, taker) = match maker_field {
        Some(field) => (entry.address_value(field)?, Some(addr)),
        None => (addr, None),
    };
    let leg = OrderLeg {
        ticket: codec::decode(entry.uint_value("ticketType")?)?,
        percentage: entry.u64_value("percentage")?,
        quantity: entry.u64_value("quantity")?,
    };
    Ok(MarketplaceEvent::Order(OrderEvent {
        kind,
        side,
        lifecycle,
        maker,
        taker,
        legs: vec![leg],
    }))
}

// Batched unit logs carry parallel `_ids` and `percentage` arrays.
fn unit_batch_order(
    entry: &LogEntry,
    kind: EventKind,
    side: OrderSide,
    lifecycle: OrderLifecycle,
    maker_field: Option<&'static str>,
) -> Result<MarketplaceEvent, DecodeError> {
    let addr = entry.address_value("addr")?;
    let (maker, taker) = match maker_field {
        Some(field) => (entry.address_value(field)?, Some(addr)),
        None => (addr, None),
    };
    let ids_field = if entry.return_values.contains_key("_ids") {
        "_ids"
    } else {
        "_id"
    };
    let ids = entry.uint_list_value(ids_field)?;
    let percentages = entry.u64_list_value("percentage")?;
    if ids.len() != percentages.len() {
        return Err(DecodeError::LengthMismatch {
            event_kind: entry.event_kind.clone(),
            left: ids_field,
            left_len: ids.len(),
            right: "percentage",
            right_len: percentages.len(),
        });
    }
    let legs = ids
        .into_iter()
        .zip(percentages)
        .map(|(id, percentage)| {
            Ok(OrderLeg {
                ticket: DecodedId::Unit(codec::decode_unit(id)?),
                percentage,
                quantity: 1,
            })
        })
        .collect::<Result<_, CodecError>>()?;
    Ok(MarketplaceEvent::Order(OrderEvent {
        kind,
        side,
        lifecycle,
        maker,
        taker,
        legs,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::{encode_type, encode_unit};
    use serde_json::json;
    use ticketsync_core::position::LogPosition;

    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn entry(kind: &str, values: serde_json::Value) -> LogEntry {
        LogEntry::new(Address::ZERO, LogPosition::new(1, 0), kind, values)
    }

    fn alice() -> Address {
        ALICE.parse().unwrap()
    }

    fn bob() -> Address {
        BOB.parse().unwrap()
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!(
            "TicketBurned".parse::<EventKind>(),
            Err(DecodeError::UnknownEventKind("TicketBurned".to_string()))
        );
    }

    #[test]
    fn decodes_fungible_mint() {
        let id = encode_type(TicketTypeId::fungible(3)).to_string();
        let event = decode_log(&entry(
            "MintFungibles",
            json!({ "owner": ALICE, "ticketType": id, "quantity": "5" }),
        ))
        .unwrap();
        assert_eq!(
            event,
            MarketplaceEvent::MintFungibles {
                owner: alice(),
                ticket_type: TicketTypeId::fungible(3),
                quantity: 5,
            }
        );
        assert!(event.concerns(alice()));
        assert!(!event.concerns(bob()));
    }

    #[test]
    fn sell_fill_maker_is_seller() {
        let id = encode_type(TicketTypeId::fungible(1)).to_string();
        let event = decode_log(&entry(
            "SellOrderFungibleFilled",
            json!({ "addr": BOB, "seller": ALICE, "ticketType": id, "percentage": "10", "quantity": "1" }),
        ))
        .unwrap();
        let MarketplaceEvent::Order(order) = event else {
            unreachable!("expected an order event");
        };
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.lifecycle, OrderLifecycle::Filled);
        assert_eq!(order.maker, alice());
        assert_eq!(order.taker, Some(bob()));
    }

    #[test]
    fn batched_unit_sell_orders_become_legs() {
        let ids = vec![
            encode_unit(TicketUnitId::new(2, 1)).to_string(),
            encode_unit(TicketUnitId::new(2, 4)).to_string(),
        ];
        let event = decode_log(&entry(
            "SellOrderNonFungiblePlaced",
            json!({ "addr": ALICE, "_ids": ids, "percentage": ["90", "95"] }),
        ))
        .unwrap();
        let MarketplaceEvent::Order(order) = event else {
            unreachable!("expected an order event");
        };
        assert_eq!(order.legs.len(), 2);
        assert_eq!(order.legs[1].ticket, DecodedId::Unit(TicketUnitId::new(2, 4)));
        assert_eq!(order.legs[1].percentage, 95);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let ids = vec![encode_unit(TicketUnitId::new(2, 1)).to_string()];
        let err = decode_log(&entry(
            "SellOrderNonFungiblePlaced",
            json!({ "addr": ALICE, "_ids": ids, "percentage": ["90", "95"] }),
        ))
        .unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { .. }));
    }

    #[test]
    fn metadata_announcement_recovers_hash() {
        let event = decode_log(&entry(
            "EventMetadata",
            json!({ "hashFunction": "18", "size": "2", "digest": "0xbeef" }),
        ))
        .unwrap();
        assert_eq!(
            event,
            MarketplaceEvent::EventMetadata {
                content_hash: ContentHash::new("1202beef"),
            }
        );
        assert!(event.participants().is_empty());
    }

    #[test]
    fn unit_transfer_has_quantity_one() {
        let id = encode_unit(TicketUnitId::new(1, 3)).to_string();
        let event = decode_log(&entry(
            "TicketTransferred",
            json!({ "from": ALICE, "to": BOB, "id": id }),
        ))
        .unwrap();
        assert_eq!(event.event_type(), "TicketTransferred");
        assert_eq!(event.participants(), vec![alice(), bob()]);
        assert!(matches!(
            event,
            MarketplaceEvent::TicketTransferred { quantity: 1, .. }
        ));
    }

    #[test]
    fn invalid_identifier_is_reported() {
        let err = decode_log(&entry(
            "MintFungibles",
            json!({ "owner": ALICE, "ticketType": "0", "quantity": "1" }),
        ))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Identifier(_)));
    }
}
