//! Raw ledger log entries and the trait for their typed form.
//!
//! The ledger hands back each emitted log as a [`LogEntry`]: the emitting
//! contract, its [`LogPosition`], the event name, and a loosely typed map of
//! return values. Domain crates normalize entries into their own enum and
//! implement [`Event`] on it.
//!
//! Return values arrive the way JSON-RPC clients render them: unsigned
//! integers as decimal strings, `0x` hex strings or plain JSON numbers,
//! addresses as hex strings, and arrays for batched fields. The typed
//! accessors on [`LogEntry`] accept all of those.
//!
//! # Example
//!
//! ```
//! use ticketsync_core::event::LogEntry;
//! use ticketsync_core::position::LogPosition;
//! use ticketsync_core::Address;
//! use serde_json::json;
//!
//! let entry = LogEntry::new(
//!     Address::ZERO,
//!     LogPosition::new(12, 0),
//!     "MintFungibles",
//!     json!({ "quantity": "5" }),
//! );
//! assert_eq!(entry.u64_value("quantity").unwrap(), 5);
//! ```

use crate::position::LogPosition;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error types for decoding log entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// A required return value is absent.
    #[error("Missing field `{field}` in {event_kind} log")]
    MissingField {
        /// Event name of the offending entry.
        event_kind: String,
        /// Name of the absent return value.
        field: String,
    },

    /// A return value is present but has the wrong shape.
    #[error("Malformed field `{field}` in {event_kind} log: {reason}")]
    MalformedField {
        /// Event name of the offending entry.
        event_kind: String,
        /// Name of the return value.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Unknown event name encountered during normalization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// A typed domain event normalized from a [`LogEntry`].
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` to be passed between tasks while a
/// replay pass awaits its collaborators.
pub trait Event: Send + Sync + 'static {
    /// Returns the ledger event name this value was normalized from.
    fn event_type(&self) -> &'static str;

    /// Every account that participates in this event (owner, sender, buyer,
    /// seller, recipient). Used to decide whether an entry concerns an account.
    fn participants(&self) -> Vec<Address>;
}

/// One emitted ledger log, as returned by a past-log query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Contract that emitted the log.
    pub contract: Address,
    /// Chronological position on the ledger.
    pub position: LogPosition,
    /// Emitted event name, e.g. `"MintFungibles"`.
    pub event_kind: String,
    /// Named return values.
    pub return_values: Map<String, Value>,
}

impl LogEntry {
    /// Build an entry. Non-object `return_values` are treated as empty.
    #[must_use]
    pub fn new(
        contract: Address,
        position: LogPosition,
        event_kind: impl Into<String>,
        return_values: Value,
    ) -> Self {
        let return_values = match return_values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            contract,
            position,
            event_kind: event_kind.into(),
            return_values,
        }
    }

    /// Block the entry was emitted in.
    #[must_use]
    pub const fn block_number(&self) -> u64 {
        self.position.block_number
    }

    /// Raw return value by name.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::MissingField`] if the value is absent.
    pub fn value(&self, field: &str) -> Result<&Value, EventError> {
        self.return_values
            .get(field)
            .ok_or_else(|| EventError::MissingField {
                event_kind: self.event_kind.clone(),
                field: field.to_string(),
            })
    }

    /// Return value decoded as a 256-bit unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent or not an unsigned integer.
    pub fn uint_value(&self, field: &str) -> Result<U256, EventError> {
        let value = self.value(field)?;
        parse_uint(value).map_err(|reason| self.malformed(field, reason))
    }

    /// Return value decoded as a `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent, not an unsigned integer, or
    /// does not fit in 64 bits.
    pub fn u64_value(&self, field: &str) -> Result<u64, EventError> {
        let value = self.uint_value(field)?;
        u64::try_from(value).map_err(|_| self.malformed(field, "exceeds 64 bits".to_string()))
    }

    /// Return value decoded as an account address.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent or not a hex address.
    pub fn address_value(&self, field: &str) -> Result<Address, EventError> {
        let value = self.value(field)?;
        value
            .as_str()
            .ok_or_else(|| "expected a hex string".to_string())
            .and_then(|s| s.parse::<Address>().map_err(|e| e.to_string()))
            .map_err(|reason| self.malformed(field, reason))
    }

    /// Return value decoded as a list of 256-bit unsigned integers.
    ///
    /// A scalar is accepted as a one-element list.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent or any element is not an
    /// unsigned integer.
    pub fn uint_list_value(&self, field: &str) -> Result<Vec<U256>, EventError> {
        match self.value(field)? {
            Value::Array(items) => items
                .iter()
                .map(|item| parse_uint(item).map_err(|reason| self.malformed(field, reason)))
                .collect(),
            scalar => parse_uint(scalar)
                .map(|v| vec![v])
                .map_err(|reason| self.malformed(field, reason)),
        }
    }

    /// Return value decoded as a list of `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is absent or any element does not fit in
    /// 64 bits.
    pub fn u64_list_value(&self, field: &str) -> Result<Vec<u64>, EventError> {
        self.uint_list_value(field)?
            .into_iter()
            .map(|v| {
                u64::try_from(v).map_err(|_| self.malformed(field, "exceeds 64 bits".to_string()))
            })
            .collect()
    }

    fn malformed(&self, field: &str, reason: String) -> EventError {
        EventError::MalformedField {
            event_kind: self.event_kind.clone(),
            field: field.to_string(),
            reason,
        }
    }
}

fn parse_uint(value: &Value) -> Result<U256, String> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| format!("{n} is not an unsigned integer")),
        Value::String(s) => s.trim().parse::<U256>().map_err(|e| format!("{s:?}: {e}")),
        other => Err(format!("expected an unsigned integer, got {other}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(values: Value) -> LogEntry {
        LogEntry::new(Address::ZERO, LogPosition::new(1, 0), "Test", values)
    }

    #[test]
    fn uint_accepts_decimal_hex_and_number() {
        let e = entry(json!({ "a": "42", "b": "0x2a", "c": 42 }));
        assert_eq!(e.uint_value("a").unwrap(), U256::from(42u64));
        assert_eq!(e.uint_value("b").unwrap(), U256::from(42u64));
        assert_eq!(e.u64_value("c").unwrap(), 42);
    }

    #[test]
    fn missing_field_names_event_and_field() {
        let err = entry(json!({})).u64_value("quantity").unwrap_err();
        assert_eq!(
            err,
            EventError::MissingField {
                event_kind: "Test".to_string(),
                field: "quantity".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Missing field `quantity` in Test log");
    }

    #[test]
    fn negative_number_is_malformed() {
        let err = entry(json!({ "q": -1 })).u64_value("q").unwrap_err();
        assert!(matches!(err, EventError::MalformedField { .. }));
    }

    #[test]
    fn u64_rejects_wide_values() {
        let e = entry(json!({ "q": "340282366920938463463374607431768211456" }));
        assert!(e.uint_value("q").is_ok());
        assert!(e.u64_value("q").is_err());
    }

    #[test]
    fn address_parses_hex() {
        let e = entry(json!({ "owner": "0x1111111111111111111111111111111111111111", "bad": 7 }));
        assert_eq!(e.address_value("owner").unwrap(), Address::repeat_byte(0x11));
        assert!(e.address_value("bad").is_err());
    }

    #[test]
    fn lists_accept_arrays_and_scalars() {
        let e = entry(json!({ "ids": ["1", "2", 3], "one": "9" }));
        assert_eq!(e.u64_list_value("ids").unwrap(), vec![1, 2, 3]);
        assert_eq!(e.u64_list_value("one").unwrap(), vec![9]);
    }

    #[test]
    fn non_object_values_become_empty_map() {
        let e = LogEntry::new(Address::ZERO, LogPosition::new(1, 0), "Test", json!([1, 2]));
        assert!(e.return_values.is_empty());
    }
}
