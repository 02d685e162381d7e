//! Error types for marketplace replay.
//!
//! [`ReplayError`] aborts a whole sync attempt and leaves the checkpoint
//! where it was. [`ItemFailure`] describes one entry that could not be
//! applied; it is logged, recorded in the sync report and never propagated.

use crate::codec::CodecError;
use crate::events::DecodeError;
use crate::inventory::StaleSupply;
use crate::types::TicketTypeId;
use thiserror::Error;
use ticketsync_core::content_store::ContentHash;
use ticketsync_core::contract::ContractReadError;
use ticketsync_core::event_log::EventLogError;
use ticketsync_core::position::LogPosition;
use ticketsync_core::snapshot_store::SnapshotError;

/// Errors that abort a sync attempt.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// A past-log query failed.
    #[error("Log fetch failed: {0}")]
    LogFetch(#[from] EventLogError),

    /// A catalog read failed as a whole.
    #[error("Contract read failed: {0}")]
    ContractRead(#[from] ContractReadError),

    /// A snapshot could not be written or read back.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// One entry (or one metadata fetch) that could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    /// A composite ticket id is malformed.
    #[error("{position}: {source}")]
    InvalidIdentifier {
        /// Offending entry.
        position: LogPosition,
        /// Codec failure.
        source: CodecError,
    },

    /// The entry references a type the aggregate has not discovered.
    #[error("{position}: unknown ticket type {ticket_type}")]
    UnknownTicketType {
        /// Offending entry.
        position: LogPosition,
        /// Referenced type.
        ticket_type: TicketTypeId,
    },

    /// The entry's event name is not known.
    #[error("{position}: unknown event kind {kind}")]
    UnknownEventKind {
        /// Offending entry.
        position: LogPosition,
        /// Emitted name.
        kind: String,
    },

    /// The entry is missing fields or carries unusable values.
    #[error("{position}: malformed {kind}: {reason}")]
    Malformed {
        /// Offending entry.
        position: LogPosition,
        /// Emitted name.
        kind: String,
        /// What is wrong.
        reason: String,
    },

    /// A metadata payload could not be fetched or parsed.
    #[error("content {hash}: {reason}")]
    ContentFetchFailure {
        /// Requested payload.
        hash: ContentHash,
        /// Store or parse failure.
        reason: String,
    },

    /// A sale was clamped to the local supply.
    #[error("{position}: {source}")]
    StaleSupply {
        /// Offending entry.
        position: LogPosition,
        /// Clamp details.
        source: StaleSupply,
    },
}

impl ItemFailure {
    /// Classify a decode failure of the entry at `position`.
    #[must_use]
    pub fn from_decode(position: LogPosition, kind: &str, error: DecodeError) -> Self {
        match error {
            DecodeError::UnknownEventKind(kind) => Self::UnknownEventKind { position, kind },
            DecodeError::Identifier(source) => Self::InvalidIdentifier { position, source },
            other => Self::Malformed {
                position,
                kind: kind.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Position of the offending entry, if the failure came from one.
    #[must_use]
    pub const fn position(&self) -> Option<LogPosition> {
        match self {
            Self::InvalidIdentifier { position, .. }
            | Self::UnknownTicketType { position, .. }
            | Self::UnknownEventKind { position, .. }
            | Self::Malformed { position, .. }
            | Self::StaleSupply { position, .. } => Some(*position),
            Self::ContentFetchFailure { .. } => None,
        }
    }

    /// Short label used as the `reason` metric label.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => "invalid_identifier",
            Self::UnknownTicketType { .. } => "unknown_ticket_type",
            Self::UnknownEventKind { .. } => "unknown_event_kind",
            Self::Malformed { .. } => "malformed",
            Self::ContentFetchFailure { .. } => "content_fetch_failure",
            Self::StaleSupply { .. } => "stale_supply",
        }
    }

    /// Whether the entry was left unapplied. A clamped sale was still applied.
    #[must_use]
    pub const fn skipped_entry(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier { .. }
                | Self::UnknownTicketType { .. }
                | Self::UnknownEventKind { .. }
                | Self::Malformed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_classified() {
        let position = LogPosition::new(4, 1);
        let unknown = ItemFailure::from_decode(
            position,
            "TicketBurned",
            DecodeError::UnknownEventKind("TicketBurned".to_string()),
        );
        assert_eq!(unknown.reason(), "unknown_event_kind");
        assert!(unknown.skipped_entry());

        let mismatch = ItemFailure::from_decode(
            position,
            "SellOrderNonFungiblePlaced",
            DecodeError::LengthMismatch {
                event_kind: "SellOrderNonFungiblePlaced".to_string(),
                left: "_ids",
                left_len: 1,
                right: "percentage",
                right_len: 2,
            },
        );
        assert_eq!(mismatch.reason(), "malformed");
        assert!(mismatch.to_string().starts_with("4:1"));
    }

    #[test]
    fn clamped_sale_is_not_a_skip() {
        let failure = ItemFailure::StaleSupply {
            position: LogPosition::new(1, 0),
            source: StaleSupply {
                ticket_type: TicketTypeId::fungible(1),
                sold: 9,
                attempted: 2,
                supply: 10,
            },
        };
        assert!(!failure.skipped_entry());
    }
}
