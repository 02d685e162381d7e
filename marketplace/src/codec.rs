//! Composite ticket identifier codec.
//!
//! Event contracts address ticket types and units with a single 256-bit
//! integer. Viewed as four little-endian 64-bit limbs `[l0, l1, l2, l3]`:
//!
//! | bits      | limb        | meaning                              |
//! |-----------|-------------|--------------------------------------|
//! | 255       | top of `l3` | non-fungible flag                    |
//! | 192..=254 | rest of `l3`| reserved, zero                       |
//! | 128..=191 | `l2`        | type index, starting at 1            |
//! | 64..=127  | `l1`        | reserved, zero                       |
//! | 0..=63    | `l0`        | unit index, 0 for the type itself    |
//!
//! Fungible ids never carry a unit index.

use crate::types::{DecodedId, TicketTypeId, TicketUnitId};
use alloy_primitives::U256;
use thiserror::Error;

const NON_FUNGIBLE_FLAG: u64 = 1 << 63;

/// Malformed composite identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The identifier does not follow the layout.
    #[error("Invalid ticket identifier {id}: {reason}")]
    InvalidIdentifier {
        /// The offending identifier.
        id: U256,
        /// Which rule it breaks.
        reason: &'static str,
    },
}

/// Decode a composite identifier.
///
/// # Errors
///
/// Returns [`CodecError::InvalidIdentifier`] if reserved bits are set, the
/// type index is zero, or a fungible id carries a unit index.
///
/// # Examples
///
/// ```
/// use ticketsync_marketplace::codec::{decode, encode_type};
/// use ticketsync_marketplace::types::{DecodedId, TicketTypeId};
///
/// let id = encode_type(TicketTypeId::fungible(3));
/// assert_eq!(decode(id).unwrap(), DecodedId::Type(TicketTypeId::fungible(3)));
/// ```
pub fn decode(id: U256) -> Result<DecodedId, CodecError> {
    let invalid = |reason| CodecError::InvalidIdentifier { id, reason };
    let [unit_index, reserved_low, type_index, high] = *id.as_limbs();

    if reserved_low != 0 || high & !NON_FUNGIBLE_FLAG != 0 {
        return Err(invalid("reserved bits are set"));
    }
    if type_index == 0 {
        return Err(invalid("type index is zero"));
    }

    let is_fungible = high & NON_FUNGIBLE_FLAG == 0;
    match (is_fungible, unit_index) {
        (true, 0) => Ok(DecodedId::Type(TicketTypeId::fungible(type_index))),
        (true, _) => Err(invalid("fungible identifier carries a unit index")),
        (false, 0) => Ok(DecodedId::Type(TicketTypeId::non_fungible(type_index))),
        (false, unit) => Ok(DecodedId::Unit(TicketUnitId::new(type_index, unit))),
    }
}

/// Decode an identifier that must name a whole ticket type.
///
/// # Errors
///
/// Returns [`CodecError::InvalidIdentifier`] if the id is malformed or names
/// a single unit.
pub fn decode_type(id: U256) -> Result<TicketTypeId, CodecError> {
    match decode(id)? {
        DecodedId::Type(ticket_type) => Ok(ticket_type),
        DecodedId::Unit(_) => Err(CodecError::InvalidIdentifier {
            id,
            reason: "expected a ticket type, found a unit",
        }),
    }
}

/// Decode an identifier that must name a non-fungible unit.
///
/// # Errors
///
/// Returns [`CodecError::InvalidIdentifier`] if the id is malformed or names
/// a whole type.
pub fn decode_unit(id: U256) -> Result<TicketUnitId, CodecError> {
    match decode(id)? {
        DecodedId::Unit(unit) => Ok(unit),
        DecodedId::Type(_) => Err(CodecError::InvalidIdentifier {
            id,
            reason: "expected a ticket unit, found a type",
        }),
    }
}

/// Encode a ticket type.
#[must_use]
pub const fn encode_type(ticket_type: TicketTypeId) -> U256 {
    let high = if ticket_type.is_fungible {
        0
    } else {
        NON_FUNGIBLE_FLAG
    };
    U256::from_limbs([0, 0, ticket_type.type_index, high])
}

/// Encode a non-fungible unit.
#[must_use]
pub const fn encode_unit(unit: TicketUnitId) -> U256 {
    U256::from_limbs([unit.unit_index, 0, unit.type_index, NON_FUNGIBLE_FLAG])
}

/// Encode whatever [`decode`] produced.
#[must_use]
pub const fn encode(decoded: DecodedId) -> U256 {
    match decoded {
        DecodedId::Type(ticket_type) => encode_type(ticket_type),
        DecodedId::Unit(unit) => encode_unit(unit),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fungible_type_has_no_flag() {
        let id = encode_type(TicketTypeId::fungible(3));
        assert_eq!(id, U256::from(3u64) << 128_usize);
        assert!(!id.bit(255));
    }

    #[test]
    fn non_fungible_unit_sets_flag_and_unit() {
        let id = encode_unit(TicketUnitId::new(2, 7));
        assert!(id.bit(255));
        assert_eq!(decode(id).unwrap(), DecodedId::Unit(TicketUnitId::new(2, 7)));
        assert_eq!(decode_unit(id).unwrap(), TicketUnitId::new(2, 7));
        assert!(decode_type(id).is_err());
    }

    #[test]
    fn non_fungible_type_without_unit() {
        let id = encode_type(TicketTypeId::non_fungible(5));
        assert_eq!(
            decode(id).unwrap(),
            DecodedId::Type(TicketTypeId::non_fungible(5))
        );
        assert!(decode_unit(id).is_err());
    }

    #[test]
    fn rejects_zero_type_index() {
        assert!(matches!(
            decode(U256::ZERO),
            Err(CodecError::InvalidIdentifier {
                reason: "type index is zero",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unit_on_fungible() {
        let id = encode_type(TicketTypeId::fungible(1)) | U256::from(4u64);
        assert!(decode(id).is_err());
    }

    #[test]
    fn rejects_reserved_bits() {
        let base = encode_type(TicketTypeId::fungible(1));
        assert!(decode(base | (U256::from(1u64) << 64_usize)).is_err());
        assert!(decode(base | (U256::from(1u64) << 200_usize)).is_err());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            is_fungible in any::<bool>(),
            type_index in 1u64..,
            unit_index in 0u64..,
        ) {
            let decoded = if is_fungible || unit_index == 0 {
                DecodedId::Type(TicketTypeId { is_fungible, type_index })
            } else {
                DecodedId::Unit(TicketUnitId::new(type_index, unit_index))
            };
            prop_assert_eq!(decode(encode(decoded)).unwrap(), decoded);
        }

        #[test]
        fn decode_is_stable_on_arbitrary_ids(limbs in any::<[u64; 4]>()) {
            let id = U256::from_limbs(limbs);
            if let Ok(decoded) = decode(id) {
                prop_assert_eq!(encode(decoded), id);
                prop_assert_eq!(decode(encode(decoded)).unwrap(), decoded);
            }
        }
    }
}
