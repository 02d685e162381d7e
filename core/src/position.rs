//! Positions and ranges on the ledger.
//!
//! Every log entry the ledger emits is addressed by a [`LogPosition`]: its block
//! number plus its index within that block. Positions are totally ordered, which
//! is the order replay must fold entries in. [`BlockTag`] is the upper bound of
//! a log query and [`BlockRange`] is an inclusive span of blocks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for `BlockTag` parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid block tag: {0}")]
pub struct ParseBlockTagError(String);

/// Chronological address of one log entry.
///
/// Ordering is by block number first, then by log index within the block.
/// A position also serves as a replay checkpoint: everything at or before it
/// has been folded. [`LogPosition::end_of_block`] marks a block as complete.
///
/// # Examples
///
/// ```
/// use ticketsync_core::position::LogPosition;
///
/// let earlier = LogPosition::new(10, 4);
/// let later = LogPosition::new(11, 0);
/// assert!(earlier < later);
/// assert_eq!(later.to_string(), "11:0");
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    /// Block the entry was emitted in.
    pub block_number: u64,
    /// Index of the entry within its block.
    pub log_index: u64,
}

impl LogPosition {
    /// Create a new position.
    #[must_use]
    pub const fn new(block_number: u64, log_index: u64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }

    /// Position after every entry of `block_number`.
    #[must_use]
    pub const fn end_of_block(block_number: u64) -> Self {
        Self::new(block_number, u64::MAX)
    }

    /// Whether every entry of the block lies at or before this position.
    #[must_use]
    pub const fn closes_block(&self) -> bool {
        self.log_index == u64::MAX
    }

    /// First block that may still hold entries after this position.
    #[must_use]
    pub const fn next_block(&self) -> u64 {
        if self.closes_block() {
            self.block_number.saturating_add(1)
        } else {
            self.block_number
        }
    }

    /// The position right before this one.
    #[must_use]
    pub const fn predecessor(&self) -> Self {
        match self.log_index.checked_sub(1) {
            Some(log_index) => Self::new(self.block_number, log_index),
            None => Self::end_of_block(self.block_number.saturating_sub(1)),
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.closes_block() {
            write!(f, "{}:end", self.block_number)
        } else {
            write!(f, "{}:{}", self.block_number, self.log_index)
        }
    }
}

/// Upper bound of a log query.
///
/// # Examples
///
/// ```
/// use ticketsync_core::position::BlockTag;
///
/// let tag: BlockTag = "latest".parse().unwrap();
/// assert_eq!(tag, BlockTag::Latest);
/// assert_eq!("42".parse::<BlockTag>().unwrap(), BlockTag::Number(42));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockTag {
    /// A concrete block number (inclusive).
    Number(u64),
    /// Whatever block is the head when the query runs.
    Latest,
}

impl BlockTag {
    /// Resolve the tag against a known head block.
    #[must_use]
    pub const fn resolve(self, head: u64) -> u64 {
        match self {
            Self::Number(n) => n,
            Self::Latest => head,
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Latest => write!(f, "latest"),
        }
    }
}

impl FromStr for BlockTag {
    type Err = ParseBlockTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        s.parse::<u64>()
            .map(Self::Number)
            .map_err(|_| ParseBlockTagError(s.to_string()))
    }
}

impl From<u64> for BlockTag {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

/// Inclusive span of blocks `[from, to]`.
///
/// # Examples
///
/// ```
/// use ticketsync_core::position::BlockRange;
///
/// let gap = BlockRange::new(11, 14).unwrap();
/// assert_eq!(gap.len(), 4);
/// assert!(BlockRange::new(15, 14).is_none());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    /// First block (inclusive).
    pub from: u64,
    /// Last block (inclusive).
    pub to: u64,
}

impl BlockRange {
    /// Create a range, or `None` when `from > to`.
    #[must_use]
    pub const fn new(from: u64, to: u64) -> Option<Self> {
        if from > to {
            None
        } else {
            Some(Self { from, to })
        }
    }

    /// Number of blocks covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// A range always covers at least one block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether `block` falls inside the range.
    #[must_use]
    pub const fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }

    /// Split into consecutive windows of at most `size` blocks.
    ///
    /// A `size` of zero is treated as one.
    #[must_use]
    pub fn windows(&self, size: u64) -> Vec<Self> {
        let size = size.max(1);
        let mut windows = Vec::new();
        let mut start = self.from;
        loop {
            let end = start.saturating_add(size - 1).min(self.to);
            windows.push(Self {
                from: start,
                to: end,
            });
            if end >= self.to {
                break;
            }
            start = end + 1;
        }
        windows
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod log_position_tests {
        use super::*;

        #[test]
        fn ordering_is_block_then_index() {
            let mut positions = vec![
                LogPosition::new(12, 0),
                LogPosition::new(11, 7),
                LogPosition::new(11, 2),
            ];
            positions.sort();
            assert_eq!(
                positions,
                vec![
                    LogPosition::new(11, 2),
                    LogPosition::new(11, 7),
                    LogPosition::new(12, 0),
                ]
            );
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", LogPosition::new(3, 9)), "3:9");
            assert_eq!(format!("{}", LogPosition::end_of_block(3)), "3:end");
        }

        #[test]
        fn end_of_block_follows_every_entry_of_the_block() {
            let end = LogPosition::end_of_block(14);
            assert!(LogPosition::new(14, 900) < end);
            assert!(end < LogPosition::new(15, 0));
            assert_eq!(end.next_block(), 15);
            assert_eq!(LogPosition::new(14, 0).next_block(), 14);
        }

        #[test]
        fn predecessor_steps_back_one_entry() {
            assert_eq!(LogPosition::new(5, 3).predecessor(), LogPosition::new(5, 2));
            assert_eq!(LogPosition::new(5, 0).predecessor(), LogPosition::end_of_block(4));
        }
    }

    mod block_tag_tests {
        use super::*;

        #[test]
        #[allow(clippy::expect_used)] // Panics: Test will fail if parse fails
        fn parse_latest_and_number() {
            assert_eq!("LATEST".parse::<BlockTag>().expect("parse"), BlockTag::Latest);
            assert_eq!("17".parse::<BlockTag>().expect("parse"), BlockTag::Number(17));
        }

        #[test]
        fn parse_garbage_fails() {
            assert!("pending-ish".parse::<BlockTag>().is_err());
        }

        #[test]
        fn resolve_against_head() {
            assert_eq!(BlockTag::Latest.resolve(99), 99);
            assert_eq!(BlockTag::Number(5).resolve(99), 5);
        }
    }

    mod block_range_tests {
        use super::*;

        #[test]
        fn windows_cover_range_exactly() {
            let Some(range) = BlockRange::new(11, 20) else {
                unreachable!("valid range");
            };
            let windows = range.windows(4);
            assert_eq!(
                windows,
                vec![
                    BlockRange { from: 11, to: 14 },
                    BlockRange { from: 15, to: 18 },
                    BlockRange { from: 19, to: 20 },
                ]
            );
        }

        #[test]
        fn single_window_when_size_exceeds_len() {
            let Some(range) = BlockRange::new(11, 14) else {
                unreachable!("valid range");
            };
            assert_eq!(range.windows(5000), vec![range]);
            assert_eq!(range.windows(0).len(), 4);
        }

        #[test]
        fn contains_is_inclusive() {
            let Some(range) = BlockRange::new(11, 14) else {
                unreachable!("valid range");
            };
            assert!(range.contains(11));
            assert!(range.contains(14));
            assert!(!range.contains(15));
        }
    }
}
