//! NotePanel: the session object a host view drives.
//!
//! Lifecycle: seed the collection from storage, `hydrate` after the host's
//! first stable render, then `refresh` against the remote feed. Local
//! creates apply immediately and synchronously; a remote merge applies only
//! when its fetch is still the live one.

use crate::events::{EventBus, PanelEvent};
use crate::note::{Note, NoteCollection};
use crate::reconcile::{self, FetchCycle, FetchTicket};
use crate::remote::{FeedQuery, NoteFeed, Result as FeedResult};
use crate::storage::{KeyValueStorage, LocalStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct NotePanel<S, F> {
    store: LocalStore<S>,
    feed: F,
    notes: NoteCollection,
    app_only: bool,
    hydrated: bool,
    cycle: FetchCycle,
    events: Arc<EventBus>,
}

impl<S: KeyValueStorage, F: NoteFeed> NotePanel<S, F> {
    /// Seed the panel from storage. Not yet hydrated: no notes are shown and
    /// no fetch may start until `hydrate` is called. The filter starts as
    /// app-only.
    pub fn new(storage: S, feed: F) -> Self {
        let store = LocalStore::new(storage);
        let notes = store.load();
        Self {
            store,
            feed,
            notes,
            app_only: true,
            hydrated: false,
            cycle: FetchCycle::new(),
            events: Arc::new(EventBus::new()),
        }
    }

    /// The bus the rendering collaborator subscribes to.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn hydrated(&self) -> bool {
        self.hydrated
    }

    /// Current visibility filter: app-created notes only, or everything
    /// visible at the gateway.
    pub fn app_only(&self) -> bool {
        self.app_only
    }

    /// All notes currently held, regardless of hydration.
    pub fn notes(&self) -> &NoteCollection {
        &self.notes
    }

    /// Notes for the rendering collaborator: empty until hydrated.
    pub fn visible_notes(&self) -> &[Note] {
        if self.hydrated {
            self.notes.notes()
        } else {
            &[]
        }
    }

    /// Mark the host view's first stable render complete. Idempotent.
    pub fn hydrate(&mut self) {
        self.hydrated = true;
    }

    /// Toggle the visibility filter.
    ///
    /// On change, any in-flight fetch is cancelled - its result would belong
    /// to the old filter. The caller re-runs `refresh` to fetch with the new
    /// one. Setting the same value is a no-op.
    pub fn set_app_only(&mut self, app_only: bool) {
        if self.app_only == app_only {
            return;
        }
        self.app_only = app_only;
        self.cycle.cancel();
        self.events.emit(PanelEvent::FilterChanged { app_only });
    }

    /// Begin a refresh: supersede any in-flight fetch and hand back the
    /// ticket plus the query to fetch with. `None` before hydration.
    ///
    /// Hosts with their own schedulers drive this and `apply_refresh`
    /// directly; `refresh` composes them for everyone else.
    pub fn begin_refresh(&mut self) -> Option<(FetchTicket, FeedQuery)> {
        if !self.hydrated {
            debug!("Refresh requested before hydration, skipping");
            return None;
        }
        Some((self.cycle.begin(), FeedQuery::page(self.app_only)))
    }

    /// Settle a refresh with its fetch outcome.
    ///
    /// The merge runs (and persists) only when the ticket is still the live
    /// one and the fetch succeeded; every other path leaves the collection
    /// untouched and unpersisted. Returns whether a merge was applied.
    pub fn apply_refresh(&mut self, ticket: FetchTicket, outcome: FeedResult<Vec<Value>>) -> bool {
        if !self.cycle.settle(&ticket) {
            debug!("Discarding superseded fetch result");
            return false;
        }
        let items = match outcome {
            Ok(items) => items,
            Err(e) => {
                debug!("Fetch failed, keeping current collection: {}", e);
                return false;
            }
        };
        self.notes = reconcile::reconcile(&mut self.store, &self.notes, &items);
        self.events.emit(PanelEvent::CollectionUpdated {
            count: self.notes.len(),
        });
        true
    }

    /// One full refresh cycle: fetch a page with the current filter and
    /// merge it. Returns whether a merge was applied.
    pub async fn refresh(&mut self) -> bool {
        let Some((ticket, query)) = self.begin_refresh() else {
            return false;
        };
        let outcome = self.feed.fetch_page(&query).await;
        self.apply_refresh(ticket, outcome)
    }

    /// Accept a freshly authored note from the input form.
    ///
    /// Prepends and persists immediately; no fetch is triggered. The head
    /// may sit ahead of chronological order until the next refresh.
    pub fn on_created(&mut self, note: Note) {
        let cid = note.cid.clone();
        self.notes = reconcile::on_local_create(&mut self.store, note, &self.notes);
        self.events.emit(PanelEvent::NoteCreated { cid });
        self.events.emit(PanelEvent::CollectionUpdated {
            count: self.notes.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FeedError, InMemoryFeed};
    use crate::storage::{InMemoryStorage, STORAGE_KEY};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn note(cid: &str, created_at: &str) -> Note {
        Note {
            cid: cid.into(),
            text: String::new(),
            url: format!("https://gateway.test/files/{}", cid),
            created_at: created_at.into(),
        }
    }

    fn remote_item(cid: &str, created_at: &str) -> Value {
        json!({
            "cid": cid,
            "url": format!("https://gateway.test/files/{}", cid),
            "createdAt": created_at,
        })
    }

    fn visible_cids<S: KeyValueStorage, F: NoteFeed>(panel: &NotePanel<S, F>) -> Vec<String> {
        panel
            .visible_notes()
            .iter()
            .map(|n| n.cid.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_no_fetch_before_hydration() {
        let feed = InMemoryFeed::new();
        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);

        assert!(!panel.refresh().await);
        assert_eq!(panel.feed.fetch_count(), 0);
        assert!(panel.visible_notes().is_empty());
    }

    #[tokio::test]
    async fn test_visible_notes_empty_until_hydrated() {
        let mut storage = InMemoryStorage::new();
        storage
            .set(STORAGE_KEY, r#"[{"cid":"a","url":"u","createdAt":"2024-01-02T00:00:00Z"}]"#)
            .unwrap();

        let mut panel = NotePanel::new(storage, InMemoryFeed::new());
        assert!(panel.visible_notes().is_empty());
        assert_eq!(panel.notes().len(), 1);

        panel.hydrate();
        assert_eq!(visible_cids(&panel), ["a"]);
    }

    #[tokio::test]
    async fn test_refresh_merges_and_persists() {
        let feed = InMemoryFeed::new();
        feed.push_page(vec![
            remote_item("b", "2024-01-03T00:00:00Z"),
            remote_item("a", "2024-01-02T00:00:00Z"),
        ]);

        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);
        panel.hydrate();

        assert!(panel.refresh().await);
        assert_eq!(visible_cids(&panel), ["b", "a"]);

        // Durable state mirrors memory.
        assert_eq!(panel.store.load(), *panel.notes());
    }

    #[tokio::test]
    async fn test_refresh_uses_current_filter() {
        let feed = InMemoryFeed::new();
        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);
        panel.hydrate();

        panel.refresh().await;
        panel.set_app_only(false);
        panel.refresh().await;

        let queries = panel.feed.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].app_only);
        assert!(!queries[1].app_only);
        assert_eq!(queries[0].limit, 20);
        assert!(!queries[0].include_text);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_collection_and_storage_untouched() {
        let feed = InMemoryFeed::new();
        feed.push_page(vec![remote_item("a", "2024-01-02T00:00:00Z")]);
        feed.push_error(FeedError::Status(502));

        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);
        panel.hydrate();
        assert!(panel.refresh().await);

        let before_notes = panel.notes().clone();
        let before_raw = panel.store.storage().get(STORAGE_KEY);

        assert!(!panel.refresh().await);
        assert_eq!(*panel.notes(), before_notes);
        assert_eq!(panel.store.storage().get(STORAGE_KEY), before_raw);
    }

    #[tokio::test]
    async fn test_stale_fetch_result_is_discarded() {
        let mut panel = NotePanel::new(InMemoryStorage::new(), InMemoryFeed::new());
        panel.hydrate();

        let (stale, _) = panel.begin_refresh().unwrap();
        let (live, _) = panel.begin_refresh().unwrap();

        // The stale result arrives late; it must not mutate anything.
        assert!(!panel.apply_refresh(stale, Ok(vec![remote_item("ghost", "2024-01-02T00:00:00Z")])));
        assert!(panel.visible_notes().is_empty());

        assert!(panel.apply_refresh(live, Ok(vec![remote_item("real", "2024-01-02T00:00:00Z")])));
        assert_eq!(visible_cids(&panel), ["real"]);
    }

    #[tokio::test]
    async fn test_filter_change_cancels_in_flight_fetch() {
        let mut panel = NotePanel::new(InMemoryStorage::new(), InMemoryFeed::new());
        panel.hydrate();

        let (ticket, query) = panel.begin_refresh().unwrap();
        assert!(query.app_only);

        panel.set_app_only(false);

        // The old filter's result lands after the toggle: discarded.
        assert!(!panel.apply_refresh(ticket, Ok(vec![remote_item("ghost", "2024-01-02T00:00:00Z")])));
        assert!(panel.visible_notes().is_empty());
    }

    #[tokio::test]
    async fn test_set_same_filter_is_noop() {
        let mut panel = NotePanel::new(InMemoryStorage::new(), InMemoryFeed::new());
        panel.hydrate();

        let (ticket, _) = panel.begin_refresh().unwrap();
        panel.set_app_only(true);

        // No change, so the in-flight fetch is still live.
        assert!(panel.apply_refresh(ticket, Ok(Vec::new())));
    }

    #[tokio::test]
    async fn test_local_create_lands_at_head() {
        let feed = InMemoryFeed::new();
        feed.push_page(vec![remote_item("newest-remote", "2024-06-01T00:00:00Z")]);

        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);
        panel.hydrate();
        panel.refresh().await;

        // Older than the head, but still lands first until the next merge.
        panel.on_created(note("fresh", "2024-01-01T00:00:00Z"));
        assert_eq!(visible_cids(&panel), ["fresh", "newest-remote"]);
        assert_eq!(panel.store.load(), *panel.notes());

        // The next refresh restores strict recency order.
        panel.refresh().await;
        assert_eq!(visible_cids(&panel), ["newest-remote", "fresh"]);
    }

    #[tokio::test]
    async fn test_local_create_does_not_fetch() {
        let mut panel = NotePanel::new(InMemoryStorage::new(), InMemoryFeed::new());
        panel.hydrate();

        panel.on_created(note("fresh", "2024-01-01T00:00:00Z"));
        assert_eq!(panel.feed.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_broken_storage_keeps_memory_authoritative() {
        let mut storage = InMemoryStorage::new();
        storage.fail_writes(true);

        let mut panel = NotePanel::new(storage, InMemoryFeed::new());
        panel.hydrate();

        panel.on_created(note("fresh", "2024-01-01T00:00:00Z"));
        assert_eq!(visible_cids(&panel), ["fresh"]);
    }

    #[tokio::test]
    async fn test_events_emitted_on_update_create_and_filter() {
        let feed = InMemoryFeed::new();
        feed.push_page(vec![remote_item("a", "2024-01-02T00:00:00Z")]);

        let mut panel = NotePanel::new(InMemoryStorage::new(), feed);
        let updates = Arc::new(AtomicUsize::new(0));
        let updates_clone = Arc::clone(&updates);
        let _sub = panel.events().subscribe(move |event| {
            if matches!(event, PanelEvent::CollectionUpdated { .. }) {
                updates_clone.fetch_add(1, Ordering::Relaxed);
            }
        });

        panel.hydrate();
        panel.refresh().await;
        panel.on_created(note("fresh", "2024-01-01T00:00:00Z"));
        panel.set_app_only(false);

        // One update for the merge, one for the create.
        assert_eq!(updates.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_seeds_from_storage_and_survives_bad_seed() {
        let mut storage = InMemoryStorage::new();
        storage.set(STORAGE_KEY, "{definitely not json").unwrap();

        let mut panel = NotePanel::new(storage, InMemoryFeed::new());
        panel.hydrate();
        assert!(panel.visible_notes().is_empty());
    }
}
