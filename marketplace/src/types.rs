//! Domain types for the ticket marketplace.
//!
//! Identifiers, holdings and presale participation. Ticket types and units
//! are addressed within one event contract; anything that spans contracts
//! (a user's holdings) carries the event address alongside.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::Address;

/// Owner of a unit that nobody bought yet.
pub const NULL_ADDRESS: Address = Address::ZERO;

// ============================================================================
// Identifiers
// ============================================================================

/// A class of tickets within one event contract.
///
/// Type indices start at 1 and are counted separately for fungible and
/// non-fungible types, so `(true, 1)` and `(false, 1)` are different types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketTypeId {
    /// Whether units of this type are interchangeable.
    pub is_fungible: bool,
    /// Index of the type among types of the same fungibility.
    pub type_index: u64,
}

impl TicketTypeId {
    /// A fungible type.
    #[must_use]
    pub const fn fungible(type_index: u64) -> Self {
        Self {
            is_fungible: true,
            type_index,
        }
    }

    /// A non-fungible type.
    #[must_use]
    pub const fn non_fungible(type_index: u64) -> Self {
        Self {
            is_fungible: false,
            type_index,
        }
    }
}

impl fmt::Display for TicketTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_fungible { "F" } else { "NF" };
        write!(f, "{prefix}{}", self.type_index)
    }
}

/// One individually owned unit of a non-fungible type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketUnitId {
    /// Index of the (non-fungible) type.
    pub type_index: u64,
    /// Index of the unit within its type, starting at 1.
    pub unit_index: u64,
}

impl TicketUnitId {
    /// Create a unit id.
    #[must_use]
    pub const fn new(type_index: u64, unit_index: u64) -> Self {
        Self {
            type_index,
            unit_index,
        }
    }

    /// The type this unit belongs to.
    #[must_use]
    pub const fn ticket_type(&self) -> TicketTypeId {
        TicketTypeId::non_fungible(self.type_index)
    }
}

impl fmt::Display for TicketUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NF{}#{}", self.type_index, self.unit_index)
    }
}

/// What a composite identifier decodes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecodedId {
    /// A whole ticket type.
    Type(TicketTypeId),
    /// A single non-fungible unit.
    Unit(TicketUnitId),
}

impl DecodedId {
    /// The ticket type, whichever form was decoded.
    #[must_use]
    pub const fn ticket_type(&self) -> TicketTypeId {
        match self {
            Self::Type(t) => *t,
            Self::Unit(u) => u.ticket_type(),
        }
    }

    /// The unit, if a unit was decoded.
    #[must_use]
    pub const fn unit(&self) -> Option<TicketUnitId> {
        match self {
            Self::Type(_) => None,
            Self::Unit(u) => Some(*u),
        }
    }
}

impl fmt::Display for DecodedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => fmt::Display::fmt(t, f),
            Self::Unit(u) => fmt::Display::fmt(u, f),
        }
    }
}

// ============================================================================
// User-side records
// ============================================================================

/// Interchangeable tickets of one type held by an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FungibleHolding {
    /// Event contract the type belongs to.
    pub event: Address,
    /// Fungible type index.
    pub type_index: u64,
    /// Number of units held. Never zero while the holding exists.
    pub quantity: u64,
}

/// One non-fungible unit held by an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonFungibleHolding {
    /// Event contract the unit belongs to.
    pub event: Address,
    /// The unit.
    pub unit: TicketUnitId,
}

/// An account's participation in one presale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresaleState {
    /// Joined with the drawn lucky number; outcome pending.
    Joined {
        /// Number drawn when joining.
        lucky_number: u64,
    },
    /// Won and claimed the ticket.
    Claimed,
    /// Lost and got the price refunded.
    Refunded,
}

impl PresaleState {
    /// A joined presale whose outcome is still open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Joined { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(TicketTypeId::fungible(3).to_string(), "F3");
        assert_eq!(TicketTypeId::non_fungible(2).to_string(), "NF2");
        assert_eq!(TicketUnitId::new(2, 9).to_string(), "NF2#9");
    }

    #[test]
    fn decoded_unit_belongs_to_non_fungible_type() {
        let decoded = DecodedId::Unit(TicketUnitId::new(4, 1));
        assert_eq!(decoded.ticket_type(), TicketTypeId::non_fungible(4));
        assert_eq!(decoded.unit(), Some(TicketUnitId::new(4, 1)));
        assert_eq!(DecodedId::Type(TicketTypeId::fungible(4)).unit(), None);
    }

    #[test]
    fn only_joined_presale_is_active() {
        assert!(PresaleState::Joined { lucky_number: 7 }.is_active());
        assert!(!PresaleState::Claimed.is_active());
        assert!(!PresaleState::Refunded.is_active());
    }
}
