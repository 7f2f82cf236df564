//! Reconciliation: merge a remote page into the local collection, and the
//! epoch guard that keeps superseded fetches from clobbering newer state.
//!
//! The merge itself is synchronous and pure. The asynchronous half of a
//! refresh (the fetch) is bracketed by `FetchCycle::begin` and `settle`:
//! only the most recently begun fetch may settle, so a stale in-flight
//! result is discarded no matter when it arrives.

use crate::note::{Note, NoteCollection};
use crate::remote::RemoteNote;
use crate::storage::{KeyValueStorage, LocalStore};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Merge one remote page into `current`.
///
/// Remote records that fail the shape contract, or whose cid is already
/// taken (by `current` or by an earlier record in the page), are dropped
/// silently. Survivors are appended after `current` and the whole collection
/// is re-sorted by recency, unparseable timestamps last.
pub fn merge_remote_page(current: &NoteCollection, items: &[Value]) -> NoteCollection {
    let mut seen: HashSet<String> = current.iter().map(|n| n.cid.clone()).collect();
    let mut merged: Vec<Note> = current.notes().to_vec();

    for item in items {
        let Some(remote) = RemoteNote::from_value(item) else {
            continue;
        };
        if !seen.insert(remote.cid.clone()) {
            continue;
        }
        merged.push(remote.into_note());
    }

    debug!(
        "Admitted {} of {} remote item(s) against {} local note(s)",
        merged.len() - current.len(),
        items.len(),
        current.len()
    );

    let mut collection = NoteCollection::from_notes(merged);
    collection.sort_by_recency();
    collection
}

/// One full merge step: merge the page and persist the result.
pub fn reconcile<S: KeyValueStorage>(
    store: &mut LocalStore<S>,
    current: &NoteCollection,
    items: &[Value],
) -> NoteCollection {
    let merged = merge_remote_page(current, items);
    store.save(&merged);
    merged
}

/// Prepend a freshly authored note and persist.
///
/// No dedup check: the caller guarantees a newly minted cid. No fetch is
/// triggered, so the collection may transiently violate recency order until
/// the next reconcile.
pub fn on_local_create<S: KeyValueStorage>(
    store: &mut LocalStore<S>,
    note: Note,
    current: &NoteCollection,
) -> NoteCollection {
    let mut next = current.clone();
    next.prepend(note);
    store.save(&next);
    next
}

/// Identifies one begun fetch. A ticket whose epoch is stale at settlement
/// time is a cancelled cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    epoch: u64,
}

/// Where the refresh cycle currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Fetching {
        epoch: u64,
    },
}

/// Epoch guard enforcing at most one live fetch.
///
/// `begin` supersedes whatever was in flight; `settle` admits a result only
/// when its ticket is still the live one; `cancel` discards the in-flight
/// fetch outright (filter change, unmount).
#[derive(Debug, Default)]
pub struct FetchCycle {
    epoch: u64,
    state: FetchState,
}

impl FetchCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    /// Start a fetch, superseding any in-flight one.
    pub fn begin(&mut self) -> FetchTicket {
        self.epoch += 1;
        self.state = FetchState::Fetching { epoch: self.epoch };
        FetchTicket { epoch: self.epoch }
    }

    /// Whether this ticket still identifies the live fetch.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.epoch == self.epoch
    }

    /// Settle a fetch. Returns true (and transitions to Idle) only for the
    /// live ticket; a stale ticket leaves the state untouched so a newer
    /// in-flight fetch is unaffected.
    pub fn settle(&mut self, ticket: &FetchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = FetchState::Idle;
        true
    }

    /// Discard the in-flight fetch, if any. Its ticket can never settle.
    pub fn cancel(&mut self) {
        self.epoch += 1;
        self.state = FetchState::Idle;
    }
}
