//! Replay coordinator: gap filling, ordering, deduplication and folding.
//!
//! A sync pass takes the entries the caller already holds (typically from a
//! live subscription), fills the block gap between the target's checkpoint and
//! those entries from the [`EventLog`], and folds the merged sequence in
//! ascending `(block, log_index)` order. Effects returned by the fold (content
//! fetches) are driven to completion before the next entry is folded, so the
//! target is never observed with an entry half applied.
//!
//! Checkpoints are [`LogPosition`]s, so two batches delivering entries of the
//! same block are both folded. An entry the target cannot fold yet (see
//! [`ReplayTarget::halts_on`]) stops the pass right before it; the next pass
//! starts there again.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = ReplayCoordinator::from_config(event_log, &config.ledger);
//! let report = coordinator.sync_event(&mut event, &reader, fresh).await?;
//! let report = coordinator.sync(&mut user, event.contract(), fresh_for_user).await?;
//! ```

use crate::aggregates::event::{EventAction, EventAggregate};
use crate::aggregates::record_failure;
use crate::aggregates::user::{UserAction, UserAggregate};
use crate::catalog::{DiscoveryReport, discover_ticket_types};
use crate::config::LedgerConfig;
use crate::error::{ItemFailure, ReplayError};
use crate::events::{MarketplaceEvent, decode_log};
use crate::types::Address;
use metrics::counter;
use std::collections::VecDeque;
use std::sync::Arc;
use ticketsync_core::SmallVec;
use ticketsync_core::contract::ContractReader;
use ticketsync_core::effect::Effect;
use ticketsync_core::event::LogEntry;
use ticketsync_core::event_log::{EventFilter, EventLog};
use ticketsync_core::position::{BlockRange, BlockTag, LogPosition};

/// Default number of blocks per gap query.
pub const DEFAULT_GAP_BATCH_SIZE: u64 = 5000;

/// An aggregate the coordinator can fold log entries into.
pub trait ReplayTarget: Send {
    /// Reducer input type.
    type Action: Send + 'static;

    /// Every entry of `contract` at or before this position is folded.
    fn checkpoint(&self, contract: Address) -> LogPosition;

    /// Whether a decoded entry of `contract` affects the target.
    fn concerns(&self, contract: Address, event: &MarketplaceEvent) -> bool;

    /// Action folding one entry.
    fn replayed(contract: Address, position: LogPosition, event: MarketplaceEvent) -> Self::Action;

    /// Action advancing the checkpoint of `contract`.
    fn synced(contract: Address, position: LogPosition) -> Self::Action;

    /// Work left over from an earlier pass, dispatched before any entry.
    fn resume(&self) -> Option<Self::Action> {
        None
    }

    /// Fold one action and return its effects.
    fn dispatch(&mut self, action: Self::Action) -> SmallVec<[Effect<Self::Action>; 4]>;

    /// Per-item failures recorded since the last call.
    fn drain_failures(&mut self) -> Vec<ItemFailure>;

    /// Whether `failure` means its entry must be folded again later rather
    /// than skipped. Replay stops before such an entry.
    fn halts_on(&self, _failure: &ItemFailure) -> bool {
        false
    }
}

/// Every entry of the event's own contract concerns it.
impl ReplayTarget for EventAggregate {
    type Action = EventAction;

    fn checkpoint(&self, _contract: Address) -> LogPosition {
        self.state().checkpoint()
    }

    fn concerns(&self, contract: Address, _event: &MarketplaceEvent) -> bool {
        contract == self.contract()
    }

    fn replayed(_contract: Address, position: LogPosition, event: MarketplaceEvent) -> EventAction {
        EventAction::Replayed { position, event }
    }

    fn synced(_contract: Address, position: LogPosition) -> EventAction {
        EventAction::Synced { position }
    }

    fn resume(&self) -> Option<EventAction> {
        (!self.state().pending_metadata().is_empty()).then_some(EventAction::RetryMetadata)
    }

    fn dispatch(&mut self, action: EventAction) -> SmallVec<[Effect<EventAction>; 4]> {
        self.send(action)
    }

    fn drain_failures(&mut self) -> Vec<ItemFailure> {
        EventAggregate::drain_failures(self)
    }

    // A type missing from the catalog is one discovery has not read yet.
    fn halts_on(&self, failure: &ItemFailure) -> bool {
        matches!(failure, ItemFailure::UnknownTicketType { .. })
    }
}

/// Entries naming the account as a participant concern the user.
impl ReplayTarget for UserAggregate {
    type Action = UserAction;

    fn checkpoint(&self, contract: Address) -> LogPosition {
        self.state().checkpoint(contract)
    }

    fn concerns(&self, _contract: Address, event: &MarketplaceEvent) -> bool {
        event.concerns(self.account())
    }

    fn replayed(contract: Address, position: LogPosition, event: MarketplaceEvent) -> UserAction {
        UserAction::Replayed {
            contract,
            position,
            event,
        }
    }

    fn synced(contract: Address, position: LogPosition) -> UserAction {
        UserAction::Synced { contract, position }
    }

    fn dispatch(&mut self, action: UserAction) -> SmallVec<[Effect<UserAction>; 4]> {
        self.send(action)
    }

    fn drain_failures(&mut self) -> Vec<ItemFailure> {
        UserAggregate::drain_failures(self)
    }
}

/// Outcome of one sync pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Range fetched from the event log, if any.
    pub gap: Option<BlockRange>,
    /// Entries folded into the target.
    pub applied: usize,
    /// Entries dropped because they were already folded.
    pub duplicates: usize,
    /// Entries that do not concern the target.
    pub irrelevant: usize,
    /// Per-item failures, in the order they happened.
    pub failures: Vec<ItemFailure>,
    /// Entry the pass stopped before, if it could not be folded yet.
    pub halted_at: Option<LogPosition>,
    /// Checkpoint after the pass.
    pub checkpoint: LogPosition,
}

/// Outcome of [`ReplayCoordinator::sync_event`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventSyncReport {
    /// Catalog discovery pass.
    pub discovery: DiscoveryReport,
    /// Log replay pass.
    pub sync: SyncReport,
}

/// Drives sync passes against one event log.
///
/// The coordinator holds no per-aggregate state; callers own their aggregates
/// and must not sync the same aggregate from two tasks at once.
#[derive(Clone)]
pub struct ReplayCoordinator {
    event_log: Arc<dyn EventLog>,
    gap_batch_size: u64,
    start_block: u64,
}

impl ReplayCoordinator {
    /// Coordinator with default gap windows, replaying from block 1.
    #[must_use]
    pub fn new(event_log: Arc<dyn EventLog>) -> Self {
        Self {
            event_log,
            gap_batch_size: DEFAULT_GAP_BATCH_SIZE,
            start_block: 1,
        }
    }

    /// Coordinator configured from [`LedgerConfig`].
    #[must_use]
    pub fn from_config(event_log: Arc<dyn EventLog>, config: &LedgerConfig) -> Self {
        Self::new(event_log)
            .with_gap_batch_size(config.gap_batch_size)
            .with_start_block(config.start_block)
    }

    /// Maximum blocks per gap query (zero is treated as one).
    #[must_use]
    pub fn with_gap_batch_size(mut self, size: u64) -> Self {
        self.gap_batch_size = size.max(1);
        self
    }

    /// First block worth querying; earlier blocks are never fetched.
    #[must_use]
    pub const fn with_start_block(mut self, block: u64) -> Self {
        self.start_block = block;
        self
    }

    /// Bring `target` up to date with `contract`.
    ///
    /// `fresh` holds entries the caller already has; it may overlap what was
    /// folded before and may contain entries of other contracts.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::LogFetch`] if a gap query fails. Nothing has
    /// been folded at that point and the checkpoint is unchanged.
    ///
    /// An entry the target halts on is not an error: the pass stops before
    /// it and reports it in [`SyncReport::halted_at`].
    #[tracing::instrument(skip(self, target, fresh), fields(contract = %contract, fresh = fresh.len()))]
    pub async fn sync<T: ReplayTarget>(
        &self,
        target: &mut T,
        contract: Address,
        fresh: Vec<LogEntry>,
    ) -> Result<SyncReport, ReplayError> {
        let result = self.run_sync(target, contract, fresh).await;
        if let Err(error) = &result {
            counter!("ticketsync_sync_failures_total").increment(1);
            tracing::error!(error = %error, "Sync failed, checkpoint left unchanged");
        }
        result
    }

    /// Discover the event's ticket types, then sync its logs.
    ///
    /// Entries of a type whose catalog read failed halt the sync before them;
    /// the next call reads the type again and resumes there.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::ContractRead`] if discovery cannot read the
    /// catalog, or any error of [`ReplayCoordinator::sync`].
    #[tracing::instrument(skip(self, event, reader, fresh), fields(contract = %event.contract()))]
    pub async fn sync_event(
        &self,
        event: &mut EventAggregate,
        reader: &dyn ContractReader,
        fresh: Vec<LogEntry>,
    ) -> Result<EventSyncReport, ReplayError> {
        let discovery = discover_ticket_types(event, reader, self.event_log.as_ref())
            .await
            .inspect_err(|_| counter!("ticketsync_sync_failures_total").increment(1))?;
        let contract = event.contract();
        let sync = self.sync(event, contract, fresh).await?;
        Ok(EventSyncReport { discovery, sync })
    }

    async fn run_sync<T: ReplayTarget>(
        &self,
        target: &mut T,
        contract: Address,
        fresh: Vec<LogEntry>,
    ) -> Result<SyncReport, ReplayError> {
        let checkpoint = target.checkpoint(contract);
        let gap_start = checkpoint.next_block().max(self.start_block);
        let mut report = SyncReport {
            checkpoint,
            ..SyncReport::default()
        };

        let mut batch = Vec::with_capacity(fresh.len());
        for entry in fresh {
            if entry.contract != contract {
                report.irrelevant += 1;
            } else if entry.position <= checkpoint {
                tracing::debug!(position = %entry.position, "Skipping entry at or before checkpoint");
                report.duplicates += 1;
            } else {
                batch.push(entry);
            }
        }

        let gap_end = match batch.iter().map(LogEntry::block_number).min() {
            Some(earliest) => earliest.checked_sub(1),
            None => Some(self.event_log.latest_block().await?),
        };
        report.gap = gap_end.and_then(|end| BlockRange::new(gap_start, end));
        if let Some(gap) = report.gap {
            tracing::debug!(%gap, "Filling gap");
            for window in gap.windows(self.gap_batch_size) {
                let entries = self
                    .event_log
                    .get_past_logs(contract, EventFilter::All, window.from, BlockTag::Number(window.to))
                    .await?;
                batch.extend(entries);
            }
        }

        // A checkpoint inside a block refetches that block's earlier entries.
        batch.sort_by_key(|entry| entry.position);
        let before = batch.len();
        batch.dedup_by_key(|entry| entry.position);
        batch.retain(|entry| entry.position > checkpoint);
        report.duplicates += before - batch.len();

        let mut covered = report
            .gap
            .map(|gap| LogPosition::end_of_block(gap.to))
            .into_iter()
            .chain(batch.last().map(|entry| entry.position))
            .fold(checkpoint, LogPosition::max);

        if let Some(action) = target.resume() {
            drive(target, action).await;
            tally(&mut report.failures, target.drain_failures());
        }

        for entry in batch {
            if let Some(position) = Self::fold_entry(target, contract, entry, &mut report).await {
                report.halted_at = Some(position);
                covered = position.predecessor();
                break;
            }
        }

        drive(target, T::synced(contract, covered)).await;
        tally(&mut report.failures, target.drain_failures());
        report.checkpoint = target.checkpoint(contract);

        tracing::info!(
            applied = report.applied,
            duplicates = report.duplicates,
            irrelevant = report.irrelevant,
            failures = report.failures.len(),
            halted = report.halted_at.is_some(),
            checkpoint = %report.checkpoint,
            "Sync finished"
        );
        Ok(report)
    }

    // Returns the entry's position if the target halts on it.
    async fn fold_entry<T: ReplayTarget>(
        target: &mut T,
        contract: Address,
        entry: LogEntry,
        report: &mut SyncReport,
    ) -> Option<LogPosition> {
        let position = entry.position;
        let event = match decode_log(&entry) {
            Ok(event) => event,
            Err(error) => {
                let failure = ItemFailure::from_decode(position, &entry.event_kind, error);
                counter!("ticketsync_log_entries_skipped_total", "reason" => failure.reason()).increment(1);
                record_failure(&mut report.failures, contract, failure);
                return None;
            },
        };

        if !target.concerns(contract, &event) {
            tracing::trace!(%position, event_kind = %entry.event_kind, "Entry does not concern target");
            report.irrelevant += 1;
            return None;
        }

        drive(target, T::replayed(contract, position, event)).await;
        let failures = target.drain_failures();
        let own = |failure: &&ItemFailure| failure.position() == Some(position);
        let halted = failures.iter().filter(own).any(|failure| target.halts_on(failure));
        let skipped = failures.iter().filter(own).any(ItemFailure::skipped_entry);
        if halted {
            counter!("ticketsync_sync_halts_total").increment(1);
            tracing::warn!(%position, event_kind = %entry.event_kind, "Entry cannot be folded yet, stopping before it");
        } else if !skipped {
            counter!("ticketsync_log_entries_applied_total").increment(1);
            report.applied += 1;
        }
        tally(&mut report.failures, failures);
        halted.then_some(position)
    }
}

// Failures coming back from a target were already logged by its reducer.
fn tally(report: &mut Vec<ItemFailure>, failures: Vec<ItemFailure>) {
    for failure in &failures {
        match failure {
            ItemFailure::ContentFetchFailure { .. } => {
                counter!("ticketsync_content_fetch_failures_total").increment(1);
            },
            other if other.skipped_entry() => {
                counter!("ticketsync_log_entries_skipped_total", "reason" => other.reason()).increment(1);
            },
            _ => {},
        }
    }
    report.extend(failures);
}

// Depth-first: effects of a fed-back action run before the siblings of the
// effect that produced it.
async fn drive<T: ReplayTarget>(target: &mut T, action: T::Action) {
    let mut pending: VecDeque<Effect<T::Action>> = target.dispatch(action).into_iter().collect();
    while let Some(effect) = pending.pop_front() {
        match effect {
            Effect::None => {},
            Effect::Sequential(effects) => {
                for effect in effects.into_iter().rev() {
                    pending.push_front(effect);
                }
            },
            Effect::Future(future) => {
                if let Some(action) = future.await {
                    for effect in target.dispatch(action).into_iter().rev() {
                        pending.push_front(effect);
                    }
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::event::EventEnvironment;
    use crate::codec::encode_type;
    use crate::types::TicketTypeId;
    use serde_json::json;
    use std::time::Duration;
    use ticketsync_core::contract::TicketTypeMeta;
    use ticketsync_core::event_log::EventLogError;
    use ticketsync_testing::helpers::{log_entry, test_address};
    use ticketsync_testing::mocks::{InMemoryContentStore, InMemoryEventLog};

    fn contract() -> Address {
        test_address(0xee)
    }

    fn event_with_type(store: Arc<InMemoryContentStore>) -> EventAggregate {
        let mut event = EventAggregate::new(contract(), EventEnvironment::new(store, Duration::from_millis(50)));
        event.send(EventAction::TicketTypeDiscovered {
            type_id: TicketTypeId::fungible(1),
            meta: TicketTypeMeta {
                price: 100,
                supply: 100,
                tickets_sold: 0,
            },
            granularity: 5,
        });
        event
    }

    fn mint_of(type_index: u64, block: u64, log_index: u64, quantity: u64) -> LogEntry {
        log_entry(
            contract(),
            block,
            log_index,
            "MintFungibles",
            json!({
                "owner": test_address(0xa1).to_string(),
                "ticketType": encode_type(TicketTypeId::fungible(type_index)).to_string(),
                "quantity": quantity.to_string(),
            }),
        )
    }

    fn mint(block: u64, log_index: u64, quantity: u64) -> LogEntry {
        mint_of(1, block, log_index, quantity)
    }

    fn sold_of(event: &EventAggregate, type_index: u64) -> u64 {
        event
            .state()
            .ticket_type(TicketTypeId::fungible(type_index))
            .unwrap()
            .tickets_sold
    }

    fn sold(event: &EventAggregate) -> u64 {
        sold_of(event, 1)
    }

    #[tokio::test]
    async fn gap_is_split_into_windows() {
        let log = Arc::new(InMemoryEventLog::new());
        log.extend([mint(11, 0, 1), mint(13, 0, 1)]);
        let coordinator = ReplayCoordinator::new(log.clone()).with_gap_batch_size(2);
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let report = coordinator.sync(&mut event, contract(), vec![mint(15, 0, 1)]).await.unwrap();

        let ranges: Vec<(u64, BlockTag)> = log.queries().iter().map(|q| (q.from_block, q.to_block)).collect();
        assert_eq!(ranges, vec![(11, BlockTag::Number(12)), (13, BlockTag::Number(14))]);
        assert_eq!(report.gap, BlockRange::new(11, 14));
        assert_eq!(report.applied, 3);
        assert_eq!(report.checkpoint, LogPosition::new(15, 0));
        assert_eq!(sold(&event), 3);
    }

    #[tokio::test]
    async fn empty_batch_catches_up_to_head() {
        let log = Arc::new(InMemoryEventLog::new());
        log.push(mint(4, 0, 2));
        log.set_head(9);
        let coordinator = ReplayCoordinator::new(log.clone());
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));

        let report = coordinator.sync(&mut event, contract(), Vec::new()).await.unwrap();
        assert_eq!(report.gap, BlockRange::new(1, 9));
        assert_eq!(report.checkpoint, LogPosition::end_of_block(9));
        assert_eq!(sold(&event), 2);
    }

    #[tokio::test]
    async fn stale_and_foreign_entries_are_not_folded() {
        let log = Arc::new(InMemoryEventLog::new());
        let coordinator = ReplayCoordinator::new(log.clone());
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let mut foreign = mint(11, 1, 7);
        foreign.contract = test_address(0x0f);
        let fresh = vec![mint(9, 0, 1), mint(11, 0, 1), mint(11, 0, 1), foreign];
        let report = coordinator.sync(&mut event, contract(), fresh).await.unwrap();

        assert!(log.queries().is_empty());
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.irrelevant, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(sold(&event), 1);
    }

    #[tokio::test]
    async fn failed_gap_fetch_folds_nothing() {
        let log = Arc::new(InMemoryEventLog::new());
        log.fail_with(EventLogError::Transport("connection refused".to_string()));
        let coordinator = ReplayCoordinator::new(log.clone());
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let result = coordinator.sync(&mut event, contract(), vec![mint(15, 0, 1)]).await;
        assert!(matches!(result, Err(ReplayError::LogFetch(_))));
        assert_eq!(event.state().last_synced_block(), 10);
        assert_eq!(sold(&event), 0);
    }

    #[tokio::test]
    async fn bad_entry_does_not_block_the_rest() {
        let log = Arc::new(InMemoryEventLog::new());
        let coordinator = ReplayCoordinator::new(log);
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let unknown = log_entry(contract(), 11, 1, "TicketBurned", json!({}));
        let fresh = vec![mint(11, 0, 1), unknown, mint(12, 0, 2)];
        let report = coordinator.sync(&mut event, contract(), fresh).await.unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason(), "unknown_event_kind");
        assert_eq!(sold(&event), 3);
        assert_eq!(report.checkpoint, LogPosition::new(12, 0));
    }

    #[tokio::test]
    async fn metadata_is_loaded_before_the_next_entry() {
        let store = Arc::new(InMemoryContentStore::new());
        let hash = crate::metadata::content_hash(0x12, 2, "0xbeef").unwrap();
        store.insert(hash.clone(), br#"{"event": {"title": "Gala"}}"#.to_vec());
        let log = Arc::new(InMemoryEventLog::new());
        let coordinator = ReplayCoordinator::new(log);
        let mut event = event_with_type(store);
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let announce = log_entry(
            contract(),
            11,
            0,
            "EventMetadata",
            json!({ "hashFunction": "18", "size": "2", "digest": "0xbeef" }),
        );
        let report = coordinator.sync(&mut event, contract(), vec![announce]).await.unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(event.state().metadata().unwrap().title, "Gala");
        assert_eq!(event.state().content_hash(), Some(&hash));
    }

    #[tokio::test]
    async fn unloaded_metadata_is_retried_on_next_pass() {
        let store = Arc::new(InMemoryContentStore::new());
        let hash = crate::metadata::content_hash(0x12, 2, "0xbeef").unwrap();
        let log = Arc::new(InMemoryEventLog::new());
        let coordinator = ReplayCoordinator::new(log);
        let mut event = event_with_type(store.clone());
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });

        let announce = log_entry(
            contract(),
            11,
            0,
            "EventMetadata",
            json!({ "hashFunction": "18", "size": "2", "digest": "0xbeef" }),
        );
        let first = coordinator.sync(&mut event, contract(), vec![announce]).await.unwrap();
        assert_eq!(first.failures[0].reason(), "content_fetch_failure");
        assert_eq!(first.applied, 1);
        assert!(event.state().metadata().is_none());

        store.insert(hash, br#"{"event": {"title": "Gala"}}"#.to_vec());
        let second = coordinator.sync(&mut event, contract(), vec![mint(12, 0, 1)]).await.unwrap();
        assert!(second.failures.is_empty());
        assert_eq!(event.state().metadata().unwrap().title, "Gala");
    }

    #[tokio::test]
    async fn entries_of_one_block_in_separate_batches_are_all_folded() {
        let log = Arc::new(InMemoryEventLog::new());
        log.extend([mint(15, 0, 1), mint(15, 1, 2), mint(15, 2, 4)]);
        let coordinator = ReplayCoordinator::new(log.clone());
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(14),
        });

        let first = coordinator.sync(&mut event, contract(), vec![mint(15, 0, 1)]).await.unwrap();
        let second = coordinator.sync(&mut event, contract(), vec![mint(15, 1, 2)]).await.unwrap();
        assert_eq!((first.applied, second.applied), (1, 1));
        assert_eq!(second.duplicates, 0);
        assert_eq!(second.checkpoint, LogPosition::new(15, 1));
        assert!(log.queries().is_empty());

        // The subscription missed 15:2; catching up refetches block 15.
        let third = coordinator.sync(&mut event, contract(), Vec::new()).await.unwrap();
        assert_eq!(third.gap, BlockRange::new(15, 15));
        assert_eq!(third.duplicates, 2);
        assert_eq!(third.applied, 1);
        assert_eq!(third.checkpoint, LogPosition::end_of_block(15));
        assert_eq!(sold(&event), 1 + 2 + 4);
    }

    #[tokio::test]
    async fn unknown_type_halts_before_its_entry() {
        let log = Arc::new(InMemoryEventLog::new());
        let coordinator = ReplayCoordinator::new(log);
        let mut event = event_with_type(Arc::new(InMemoryContentStore::new()));
        event.send(EventAction::Synced {
            position: LogPosition::end_of_block(10),
        });
        let fresh = vec![mint(11, 0, 1), mint_of(2, 12, 0, 5), mint(13, 0, 1)];

        let report = coordinator.sync(&mut event, contract(), fresh.clone()).await.unwrap();
        assert_eq!(report.halted_at, Some(LogPosition::new(12, 0)));
        assert_eq!(report.applied, 1);
        assert_eq!(report.failures[0].reason(), "unknown_ticket_type");
        assert_eq!(report.checkpoint, LogPosition::end_of_block(11));
        assert_eq!(sold(&event), 1);

        event.send(EventAction::TicketTypeDiscovered {
            type_id: TicketTypeId::fungible(2),
            meta: TicketTypeMeta {
                price: 10,
                supply: 10,
                tickets_sold: 0,
            },
            granularity: 5,
        });
        let report = coordinator.sync(&mut event, contract(), fresh).await.unwrap();
        assert_eq!(report.halted_at, None);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.applied, 2);
        assert_eq!(report.checkpoint, LogPosition::new(13, 0));
        assert_eq!(sold(&event), 2);
        assert_eq!(sold_of(&event, 2), 5);
    }

    #[tokio::test]
    async fn user_never_halts_on_foreign_types() {
        let log = Arc::new(InMemoryEventLog::new());
        log.extend([mint_of(9, 3, 0, 2), mint(4, 0, 1)]);
        let coordinator = ReplayCoordinator::new(log);
        let mut user = UserAggregate::new(test_address(0xa1));

        let report = coordinator.sync(&mut user, contract(), Vec::new()).await.unwrap();
        assert_eq!(report.halted_at, None);
        assert_eq!(report.applied, 2);
        assert_eq!(user.state().fungible_quantity(contract(), 9), 2);
    }
}
