//! notes-core: Client-side cache synchronizer for gateway-anchored notes.
//!
//! This crate provides the core functionality for:
//! - The Note data model and its recency ordering
//! - Durable persistence through a KeyValueStorage abstraction
//! - Merging a remote feed page into the local collection (dedup by cid)
//! - An epoch-guarded refresh cycle so a superseded fetch never clobbers
//!   newer state
//! - A NotePanel session object tying the pieces together for a host view

pub mod events;
pub mod note;
pub mod panel;
pub mod reconcile;
pub mod remote;
pub mod storage;

pub use events::{EventBus, PanelEvent, Subscription};
pub use note::{Note, NoteCollection};
pub use panel::NotePanel;
pub use reconcile::{merge_remote_page, FetchCycle, FetchState, FetchTicket};
pub use remote::{FeedError, FeedQuery, InMemoryFeed, NoteFeed, RemoteNote};
pub use storage::{InMemoryStorage, KeyValueStorage, LocalStore, StorageError, STORAGE_KEY};
