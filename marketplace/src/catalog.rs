//! Ticket type discovery from contract reads.
//!
//! The contract numbers its types `1..=nonce`, separately for fungible and
//! non-fungible types. A pass reads both nonces and the aftermarket
//! granularity, then the price and supply of every type that is new or whose
//! metadata was announced again after the event's checkpoint.

use crate::aggregates::event::{EventAction, EventAggregate};
use crate::codec;
use crate::error::ReplayError;
use crate::events::{MarketplaceEvent, decode_log};
use crate::types::TicketTypeId;
use futures::future::join_all;
use std::collections::BTreeSet;
use ticketsync_core::contract::ContractReader;
use ticketsync_core::event_log::{EventFilter, EventLog};
use ticketsync_core::position::BlockTag;

/// Outcome of one discovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Types seen for the first time.
    pub discovered: Vec<TicketTypeId>,
    /// Known types whose catalog data was re-read.
    pub refreshed: Vec<TicketTypeId>,
    /// Known types left as they were.
    pub unchanged: usize,
    /// Types whose meta read failed; they are retried on the next pass.
    pub failed: Vec<TicketTypeId>,
}

/// Discover new ticket types of `event` and refresh changed ones.
///
/// Counters and unit owners of known types are never touched; they are only
/// folded from logs.
///
/// # Errors
///
/// Returns [`ReplayError::ContractRead`] if a nonce or the granularity cannot
/// be read, and [`ReplayError::LogFetch`] if the metadata-change query fails.
/// A failed meta read of a single type only skips that type for this pass.
#[tracing::instrument(skip(event, reader, event_log), fields(contract = %event.contract()))]
pub async fn discover_ticket_types(
    event: &mut EventAggregate,
    reader: &dyn ContractReader,
    event_log: &dyn EventLog,
) -> Result<DiscoveryReport, ReplayError> {
    let contract = event.contract();
    let fungible_nonce = reader.fungible_nonce(contract).await?;
    let non_fungible_nonce = reader.non_fungible_nonce(contract).await?;
    let granularity = reader.granularity(contract).await?;
    let changed = announced_since_checkpoint(event, event_log).await?;

    let mut report = DiscoveryReport::default();
    let to_read: Vec<TicketTypeId> = (1..=fungible_nonce)
        .map(TicketTypeId::fungible)
        .chain((1..=non_fungible_nonce).map(TicketTypeId::non_fungible))
        .filter(|type_id| {
            let known = event.state().ticket_type(*type_id).is_some();
            if known && !changed.contains(type_id) {
                report.unchanged += 1;
                tracing::debug!(ticket_type = %type_id, "Metadata unchanged since checkpoint");
                return false;
            }
            true
        })
        .collect();

    let reads = join_all(
        to_read
            .iter()
            .map(|type_id| reader.ticket_type_meta(contract, codec::encode_type(*type_id))),
    )
    .await;

    for (type_id, result) in to_read.into_iter().zip(reads) {
        match result {
            Ok(meta) => {
                if event.state().ticket_type(type_id).is_some() {
                    report.refreshed.push(type_id);
                } else {
                    report.discovered.push(type_id);
                }
                event.send(EventAction::TicketTypeDiscovered {
                    type_id,
                    meta,
                    granularity,
                });
            },
            Err(error) => {
                tracing::warn!(ticket_type = %type_id, error = %error, "Ticket type read failed, skipping");
                report.failed.push(type_id);
            },
        }
    }

    tracing::info!(
        discovered = report.discovered.len(),
        refreshed = report.refreshed.len(),
        unchanged = report.unchanged,
        failed = report.failed.len(),
        "Discovery pass finished"
    );
    Ok(report)
}

// Types whose metadata was announced after the checkpoint. Nothing is
// known before the first sync, so that query is skipped.
async fn announced_since_checkpoint(
    event: &EventAggregate,
    event_log: &dyn EventLog,
) -> Result<BTreeSet<TicketTypeId>, ReplayError> {
    let checkpoint = event.state().checkpoint();
    if checkpoint.block_number == 0 {
        return Ok(BTreeSet::new());
    }
    let entries = event_log
        .get_past_logs(
            event.contract(),
            EventFilter::Kind("TicketMetadata".to_string()),
            checkpoint.next_block(),
            BlockTag::Latest,
        )
        .await?;
    Ok(entries
        .iter()
        .filter_map(|entry| match decode_log(entry) {
            Ok(MarketplaceEvent::TicketMetadata { ticket_type, .. }) => Some(ticket_type),
            Ok(_) => None,
            Err(error) => {
                tracing::debug!(position = %entry.position, error = %error, "Ignoring undecodable metadata log");
                None
            },
        })
        .collect())
}
