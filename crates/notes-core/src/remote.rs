//! Remote feed seam: the paginated note listing consumed during a refresh.
//!
//! Implementations:
//! - `InMemoryFeed` - Scriptable pages for tests
//! - `GatewayFeed` (in notes-cli) - HTTP client for the gateway's /api/notes

use crate::note::Note;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Malformed body: {0}")]
    Body(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Query parameters for one page of the note listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    /// Page size.
    pub limit: u32,
    /// Whether the gateway should include full note text.
    pub include_text: bool,
    /// Restrict the listing to app-created notes rather than everything
    /// visible at the gateway.
    pub app_only: bool,
}

impl FeedQuery {
    /// The panel's standard page: 20 items, text omitted for bandwidth.
    pub fn page(app_only: bool) -> Self {
        Self {
            limit: 20,
            include_text: false,
            app_only,
        }
    }
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self::page(true)
    }
}

/// Read-only paginated note listing.
///
/// Returned records are raw candidates; the reconciler validates each one
/// against the shape contract before use. Any error means "no remote data
/// this cycle" - callers skip the merge and keep what they have.
#[async_trait]
pub trait NoteFeed: Send + Sync {
    /// Fetch one page of candidate records.
    async fn fetch_page(&self, query: &FeedQuery) -> Result<Vec<Value>>;
}

/// A remote record that passed the shape contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNote {
    pub cid: String,
    pub url: String,
    pub created_at: String,
    pub text: Option<String>,
}

impl RemoteNote {
    /// Validate a candidate record.
    ///
    /// `cid`, `url` and `createdAt` must be strings; `text` is taken only
    /// when it is a string. Anything else rejects the record as a whole -
    /// no partial record is ever admitted.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let cid = record.get("cid")?.as_str()?.to_string();
        let url = record.get("url")?.as_str()?.to_string();
        let created_at = record.get("createdAt")?.as_str()?.to_string();
        let text = record.get("text").and_then(Value::as_str).map(str::to_string);
        Some(Self {
            cid,
            url,
            created_at,
            text,
        })
    }

    /// Convert into a Note, defaulting omitted text to empty.
    pub fn into_note(self) -> Note {
        Note {
            cid: self.cid,
            text: self.text.unwrap_or_default(),
            url: self.url,
            created_at: self.created_at,
        }
    }
}

/// Scriptable feed for tests: pops queued outcomes in order and records the
/// queries it was asked for. An empty queue yields an empty page.
#[derive(Default)]
pub struct InMemoryFeed {
    outcomes: Mutex<VecDeque<Result<Vec<Value>>>>,
    queries: Mutex<Vec<FeedQuery>>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful page.
    pub fn push_page(&self, items: Vec<Value>) {
        self.outcomes.lock().unwrap().push_back(Ok(items));
    }

    /// Queue a failed fetch.
    pub fn push_error(&self, error: FeedError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// Queries seen so far, oldest first.
    pub fn queries(&self) -> Vec<FeedQuery> {
        self.queries.lock().unwrap().clone()
    }

    /// Number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl NoteFeed for InMemoryFeed {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<Vec<Value>> {
        self.queries.lock().unwrap().push(query.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
