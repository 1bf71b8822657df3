//! Domain models and value objects

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::slots::SlotTime;

/// One fetched article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier derived from feed metadata
    pub guid: String,
    /// Feed display name
    pub source: String,
    pub title: String,
    /// Canonicalized article link
    pub link: String,
    /// Timestamp string as reported by the feed (may be empty)
    pub published: String,
    pub summary: String,
    /// Final post body, set once the item has been published
    pub rewritten: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Insert payload for a freshly ingested item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub guid: String,
    pub source: String,
    pub title: String,
    pub link: String,
    pub published: String,
    pub summary: String,
}

/// Editorial style driving the writer prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFormat {
    BreakingNews,
    ToolOfTheDay,
    ExplainLike5,
    OpinionatedTake,
    UseCase,
    DailyDigest,
}

impl PostFormat {
    /// Fixed rotation order used when assigning formats to slots
    pub const ROTATION: [PostFormat; 6] = [
        PostFormat::BreakingNews,
        PostFormat::ToolOfTheDay,
        PostFormat::ExplainLike5,
        PostFormat::OpinionatedTake,
        PostFormat::UseCase,
        PostFormat::DailyDigest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostFormat::BreakingNews => "breaking_news",
            PostFormat::ToolOfTheDay => "tool_of_the_day",
            PostFormat::ExplainLike5 => "explain_like_5",
            PostFormat::OpinionatedTake => "opinionated_take",
            PostFormat::UseCase => "use_case",
            PostFormat::DailyDigest => "daily_digest",
        }
    }
}

impl fmt::Display for PostFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostFormat::ROTATION
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| format!("unknown post format: {}", s))
    }
}

/// Lifecycle state of a queue slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Planned,
    Posted,
    Error,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Planned => "planned",
            SlotStatus::Posted => "posted",
            SlotStatus::Error => "error",
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(SlotStatus::Planned),
            "posted" => Ok(SlotStatus::Posted),
            "error" => Ok(SlotStatus::Error),
            other => Err(format!("unknown slot status: {}", other)),
        }
    }
}

/// One publication intent for a `(day, slot)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSlot {
    pub day: NaiveDate,
    pub slot: SlotTime,
    pub guid: String,
    pub format: PostFormat,
    pub alt_title_1: String,
    pub alt_title_2: String,
    pub post_text: String,
    pub status: SlotStatus,
    /// Chat message ID, set on success
    pub tg_message_id: Option<i64>,
    /// Failure reason, truncated to [`MAX_ERROR_CHARS`]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Content written by the planner for a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSlotDraft {
    pub day: NaiveDate,
    pub slot: SlotTime,
    pub guid: String,
    pub format: PostFormat,
    pub alt_title_1: String,
    pub alt_title_2: String,
    pub post_text: String,
    pub created_at: DateTime<Utc>,
}

/// Output of the writer agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPost {
    pub guid: String,
    pub format: PostFormat,
    pub alt_title_1: String,
    pub alt_title_2: String,
    pub post_text: String,
}

/// Engagement counters captured for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chat_id: String,
    pub message_id: i64,
    pub captured_at: DateTime<Utc>,
    pub views: i64,
    pub forwards: i64,
    pub replies: i64,
    /// Reaction counts keyed by reaction, as a JSON object
    pub reactions_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

/// Aggregate over published items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_posts: i64,
    pub posts_last_24h: i64,
    pub top_sources: Vec<SourceCount>,
}

/// A published item as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPost {
    pub source: String,
    pub title: String,
    pub link: String,
    pub posted_at: DateTime<Utc>,
}

/// Longest error message persisted on a queue slot
pub const MAX_ERROR_CHARS: usize = 500;

/// Render a timestamp the way the store persists it
///
/// Second precision, UTC, `Z` suffix, so stored values sort lexically.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc))
}

/// ISO rendering of a queue day
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub fn parse_day(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
}
