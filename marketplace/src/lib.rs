//! # Ticketsync Marketplace
//!
//! Rebuilds the local state of a ticketing marketplace from ledger logs.
//!
//! Each event contract emits mints, aftermarket orders, presale steps and
//! metadata announcements. This crate normalizes those logs and folds them
//! into two kinds of aggregates:
//!
//! - [`EventAggregate`]: one event's ticket types, unit owners and order books
//! - [`UserAggregate`]: one account's holdings, resting orders and presales
//!
//! The [`ReplayCoordinator`] keeps an aggregate current: it fills the block
//! gap between the aggregate's checkpoint and the entries the caller already
//! holds, merges and deduplicates by log position, and folds entry by entry.
//! Bad entries are isolated as [`ItemFailure`]s; only a failed log query
//! aborts a sync, and then the checkpoint stays where it was.
//!
//! ## Modules
//!
//! - [`codec`]: 256-bit composite ticket identifiers
//! - [`order_book`]: buy and sell orders keyed by `(address, percentage, unit)`
//! - [`inventory`]: ticket types with counters, units and books
//! - [`events`]: typed decoding of raw log entries
//! - [`catalog`]: ticket type discovery from contract reads
//! - [`replay`]: the sync loop
//! - [`snapshot`]: persisting aggregates between sessions
//! - [`config`] and [`telemetry`]: environment configuration and tracing setup
//!
//! ## Example
//!
//! ```ignore
//! use ticketsync_marketplace::{Config, EventAggregate, EventEnvironment, ReplayCoordinator};
//!
//! let config = Config::from_env();
//! ticketsync_marketplace::telemetry::init_tracing(&config.logging)?;
//!
//! let coordinator = ReplayCoordinator::from_config(event_log, &config.ledger);
//! let mut event = EventAggregate::new(
//!     contract,
//!     EventEnvironment::new(content_store, config.content.fetch_timeout()),
//! );
//! let report = coordinator.sync_event(&mut event, &reader, Vec::new()).await?;
//! println!("{} entries applied, checkpoint {}", report.sync.applied, report.sync.checkpoint);
//! ```

pub mod aggregates;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod inventory;
pub mod metadata;
pub mod order_book;
pub mod replay;
pub mod snapshot;
pub mod telemetry;
pub mod types;

pub use aggregates::event::{EventAction, EventAggregate, EventEnvironment, EventState};
pub use aggregates::user::{UserAction, UserAggregate, UserState};
pub use config::Config;
pub use error::{ItemFailure, ReplayError};
pub use events::{MarketplaceEvent, decode_log};
pub use replay::{EventSyncReport, ReplayCoordinator, ReplayTarget, SyncReport};
