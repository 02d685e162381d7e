//! Aggregate snapshots persisted through a [`SnapshotStore`].
//!
//! Snapshots are JSON documents stored under `event:<address>` and
//! `user:<account>`, next to the block checkpoint they were taken at. A
//! restored aggregate resumes replay after that checkpoint without running
//! discovery again.

use crate::aggregates::event::{EventAggregate, EventEnvironment, EventSnapshot};
use crate::aggregates::user::{UserAggregate, UserSnapshot};
use crate::error::ReplayError;
use crate::types::Address;
use serde::Serialize;
use serde::de::DeserializeOwned;
use ticketsync_core::snapshot_store::{SnapshotError, SnapshotStore};

/// Store key of an event snapshot.
#[must_use]
pub fn event_key(contract: Address) -> String {
    format!("event:{contract}")
}

/// Store key of a user snapshot.
#[must_use]
pub fn user_key(account: Address) -> String {
    format!("user:{account}")
}

/// Persist `event` under [`event_key`].
///
/// # Errors
///
/// Returns [`ReplayError::Snapshot`] if encoding or the store write fails.
pub async fn save_event(store: &dyn SnapshotStore, event: &EventAggregate) -> Result<(), ReplayError> {
    let snapshot = event.to_snapshot();
    let checkpoint = snapshot.checkpoint.block_number;
    save(store, event_key(event.contract()), checkpoint, &snapshot).await
}

/// Restore the event of `contract`, or `None` if none was saved.
///
/// # Errors
///
/// Returns [`ReplayError::Snapshot`] if the store read fails or the stored
/// document is not a snapshot of `contract`.
pub async fn load_event(
    store: &dyn SnapshotStore,
    contract: Address,
    environment: EventEnvironment,
) -> Result<Option<EventAggregate>, ReplayError> {
    let Some(snapshot) = load::<EventSnapshot>(store, &event_key(contract)).await? else {
        return Ok(None);
    };
    if snapshot.contract != contract {
        return Err(mismatch("event", contract, snapshot.contract));
    }
    tracing::debug!(contract = %contract, checkpoint = %snapshot.checkpoint, "Event restored from snapshot");
    Ok(Some(EventAggregate::from_snapshot(snapshot, environment)))
}

/// Persist `user` under [`user_key`]. The stored checkpoint is the highest
/// one over all event contracts the user has folded.
///
/// # Errors
///
/// Returns [`ReplayError::Snapshot`] if encoding or the store write fails.
pub async fn save_user(store: &dyn SnapshotStore, user: &UserAggregate) -> Result<(), ReplayError> {
    let snapshot = user.to_snapshot();
    let checkpoint = snapshot
        .checkpoints
        .iter()
        .map(|&(_, position)| position.block_number)
        .max()
        .unwrap_or(0);
    save(store, user_key(user.account()), checkpoint, &snapshot).await
}

/// Restore the user of `account`, or `None` if none was saved.
///
/// # Errors
///
/// Returns [`ReplayError::Snapshot`] if the store read fails or the stored
/// document is not a snapshot of `account`.
pub async fn load_user(store: &dyn SnapshotStore, account: Address) -> Result<Option<UserAggregate>, ReplayError> {
    let Some(snapshot) = load::<UserSnapshot>(store, &user_key(account)).await? else {
        return Ok(None);
    };
    if snapshot.account != account {
        return Err(mismatch("user", account, snapshot.account));
    }
    Ok(Some(UserAggregate::from_snapshot(snapshot)))
}

async fn save<S: Serialize>(
    store: &dyn SnapshotStore,
    key: String,
    checkpoint: u64,
    snapshot: &S,
) -> Result<(), ReplayError> {
    let bytes = serde_json::to_vec(snapshot).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    tracing::debug!(key = %key, checkpoint, size = bytes.len(), "Saving snapshot");
    store.save_snapshot(key, checkpoint, bytes).await?;
    Ok(())
}

async fn load<S: DeserializeOwned>(store: &dyn SnapshotStore, key: &str) -> Result<Option<S>, ReplayError> {
    let Some((_checkpoint, bytes)) = store.load_snapshot(key).await? else {
        return Ok(None);
    };
    let snapshot = serde_json::from_slice(&bytes).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    Ok(Some(snapshot))
}

fn mismatch(kind: &str, expected: Address, found: Address) -> ReplayError {
    ReplayError::Snapshot(SnapshotError::Serialization(format!(
        "{kind} snapshot for {found} stored under {expected}"
    )))
}
