//! HTTP client for the gateway's note listing endpoint.

use async_trait::async_trait;
use notes_core::remote::{FeedError, FeedQuery, NoteFeed, Result};
use serde_json::Value;
use tracing::debug;

/// `NoteFeed` implementation over the gateway's `GET /api/notes`.
pub struct GatewayFeed {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn page_url(&self, query: &FeedQuery) -> String {
        format!(
            "{}/api/notes?limit={}&includeText={}&appOnly={}",
            self.base_url, query.limit, query.include_text, query.app_only
        )
    }
}

/// Pull the candidate records out of a listing body. A missing or non-array
/// `items` field is an empty page, not an error.
fn items_from_body(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut record) => match record.remove("items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl NoteFeed for GatewayFeed {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<Vec<Value>> {
        let url = self.page_url(query);
        debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FeedError::Body(e.to_string()))?;

        Ok(items_from_body(body))
    }
}
