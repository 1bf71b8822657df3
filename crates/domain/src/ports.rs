//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::model::{
    Item, MetricsSnapshot, MetricsSummary, NewItem, QueueSlot, QueueSlotDraft, RecentPost,
};
use crate::slots::SlotTime;

/// Error type for store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable items / queue / settings / metrics store
///
/// Every method is atomic on its own. Conditional updates return `false`
/// when the row was not in the expected state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert an item unless its guid is already known; returns true on insert
    async fn upsert_item(&self, item: &NewItem) -> Result<bool, StoreError>;

    /// Unposted items, newest first
    async fn list_unposted(&self, limit: usize) -> Result<Vec<Item>, StoreError>;

    /// Newest unposted item
    async fn pick_next_unposted(&self) -> Result<Option<Item>, StoreError> {
        Ok(self.list_unposted(1).await?.into_iter().next())
    }

    async fn get_item(&self, guid: &str) -> Result<Option<Item>, StoreError>;

    /// Record the final text and publication time of an item
    async fn mark_item_posted(
        &self,
        guid: &str,
        rewritten: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn count_items(&self) -> Result<i64, StoreError>;

    /// Write a planned slot; a row already posted is left untouched
    ///
    /// Returns true when the row was written.
    async fn upsert_queue_slot(&self, draft: &QueueSlotDraft) -> Result<bool, StoreError>;

    async fn get_queue_slot(
        &self,
        day: NaiveDate,
        slot: SlotTime,
    ) -> Result<Option<QueueSlot>, StoreError>;

    /// All slots of a day ordered by slot time
    async fn get_queue(&self, day: NaiveDate) -> Result<Vec<QueueSlot>, StoreError>;

    /// Transition planned -> posted; returns false if the slot was not planned
    async fn mark_queue_posted(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        message_id: i64,
        posted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Transition planned -> error; returns false if the slot was not planned
    async fn mark_queue_error(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        error: &str,
    ) -> Result<bool, StoreError>;

    async fn setting_get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn setting_set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn setting_or(&self, key: &str, default: &str) -> Result<String, StoreError> {
        Ok(self
            .setting_get(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Most recently published items
    async fn recent_posts(&self, limit: usize) -> Result<Vec<RecentPost>, StoreError>;

    /// Totals over published items, with `posts_last_24h` counted from `since`
    async fn metrics_summary(&self, since: DateTime<Utc>) -> Result<MetricsSummary, StoreError>;

    async fn add_metric_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError>;

    /// Message IDs of posted slots, newest first, optionally restricted to a day
    async fn list_recent_posted_message_ids(
        &self,
        day: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError>;

    /// Latest snapshots for a chat, newest first
    async fn latest_metrics(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<MetricsSnapshot>, StoreError>;
}

/// A configured feed, optionally with a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSpec {
    pub name: Option<String>,
    pub url: String,
}

impl FeedSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
        }
    }

    pub fn named(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            url: url.into(),
        }
    }
}

/// One entry of a fetched feed, as reported by the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: String,
    /// Raw summary, possibly containing markup
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedFeed {
    pub title: Option<String>,
    pub entries: Vec<FeedEntry>,
}

/// Error type for feed fetching
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status} for {url}")]
    Api { status: u16, url: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Port for downloading and parsing a feed
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FeedError>;
}

/// Error type for LLM backends
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Port for a single text-generation backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Generate a completion for a system + user prompt
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// A message accepted by the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
}

/// Error type for chat sends
#[derive(Debug, Error)]
pub enum SendError {
    #[error("API error {status}: {description}")]
    Api { status: u16, description: String },
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
}

impl SendError {
    /// Whether the message is known to be undelivered and a retry may succeed
    ///
    /// A network failure may have happened after the chat accepted the
    /// message, so it is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            SendError::RateLimited(_) => true,
            SendError::Api { status, .. } => *status == 429 || *status >= 500,
            SendError::Auth(_) | SendError::Network(_) => false,
        }
    }
}

/// Port for delivering HTML messages to a chat
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_message(&self, chat_id: &str, html: &str) -> Result<SentMessage, SendError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_transient_classification() {
        assert!(SendError::RateLimited(None).is_transient());
        assert!(
            SendError::Api {
                status: 502,
                description: "Bad Gateway".to_string()
            }
            .is_transient()
        );
        assert!(
            !SendError::Api {
                status: 400,
                description: "chat not found".to_string()
            }
            .is_transient()
        );
        assert!(!SendError::Auth("Unauthorized".to_string()).is_transient());
        assert!(!SendError::Network("operation timed out".to_string()).is_transient());
    }
}
