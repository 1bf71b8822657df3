//! Publishing use case - executes one slot or a manual post against the chat

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::model::{Item, MAX_ERROR_CHARS, SlotStatus};
use crate::ports::{ChatSender, Clock, SendError, SentMessage, Store, StoreError};
use crate::slots::{SlotTime, local_day};
use crate::text::truncate_chars;
use crate::usecases::agents::Writer;
use crate::usecases::planner::Planner;
use crate::usecases::render::Renderer;

/// Settings key holding the destination chat
pub const TARGET_CHAT_SETTING: &str = "target_chat_id";

const TARGET_NOT_SET: &str = "target_chat_id not set";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for the publisher
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub timezone: Tz,
    /// Static fallback when no target is stored in settings
    pub default_target: Option<String>,
    /// Extra attempts after a transient send failure
    pub send_retries: u32,
    /// First retry delay, doubled per attempt
    pub retry_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            default_target: None,
            send_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Result of a publication attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Posted { guid: String, message_id: i64 },
    /// Nothing was sent and nothing was changed
    Skipped { reason: String },
    /// The attempt failed; for a slot the failure has been recorded
    Failed { error: String },
}

impl PublishOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, PublishOutcome::Posted { .. })
    }

    fn skipped(reason: impl Into<String>) -> Self {
        PublishOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Posted { message_id, .. } => write!(f, "message_id={}", message_id),
            PublishOutcome::Skipped { reason } => f.write_str(reason),
            PublishOutcome::Failed { error } => f.write_str(error),
        }
    }
}

type SlotKey = (NaiveDate, SlotTime);

pub struct SlotPublisher {
    store: Arc<dyn Store>,
    planner: Arc<Planner>,
    writer: Arc<Writer>,
    sender: Arc<dyn ChatSender>,
    clock: Arc<dyn Clock>,
    renderer: Renderer,
    config: PublisherConfig,
    slot_locks: std::sync::Mutex<HashMap<SlotKey, Arc<tokio::sync::Mutex<()>>>>,
    manual_lock: tokio::sync::Mutex<()>,
}

impl SlotPublisher {
    pub fn new(
        store: Arc<dyn Store>,
        planner: Arc<Planner>,
        writer: Arc<Writer>,
        sender: Arc<dyn ChatSender>,
        clock: Arc<dyn Clock>,
        config: PublisherConfig,
    ) -> Self {
        Self {
            store,
            planner,
            writer,
            sender,
            clock,
            renderer: Renderer::default(),
            config,
            slot_locks: std::sync::Mutex::new(HashMap::new()),
            manual_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn timezone(&self) -> &Tz {
        &self.config.timezone
    }

    /// Today in the configured timezone
    pub fn today(&self) -> NaiveDate {
        local_day(&self.config.timezone, self.clock.now())
    }

    /// Target from settings, else the static default
    pub async fn resolve_target(&self) -> Result<Option<String>, PublishError> {
        let stored = self.store.setting_get(TARGET_CHAT_SETTING).await?;
        Ok(stored
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                self.config
                    .default_target
                    .clone()
                    .filter(|t| !t.trim().is_empty())
            })
            .map(|t| t.trim().to_string()))
    }

    /// Publish today's queue entry for `slot`
    ///
    /// A slot is sent at most once: posted and failed slots are reported
    /// without contacting the chat.
    pub async fn post_scheduled(&self, slot: SlotTime) -> Result<PublishOutcome, PublishError> {
        let Some(target) = self.resolve_target().await? else {
            tracing::warn!(%slot, "Skipping slot, no target chat configured");
            return Ok(PublishOutcome::skipped(TARGET_NOT_SET));
        };

        let day = self.today();
        if let Err(e) = self.planner.ensure_daily_queue(day).await {
            tracing::warn!(%day, error = %e, "Planning before publish failed");
        }

        let lock = self.slot_lock(day, slot);
        let _guard = lock.lock().await;

        let Some(row) = self.store.get_queue_slot(day, slot).await? else {
            return Ok(PublishOutcome::skipped("no planned slot"));
        };

        match row.status {
            SlotStatus::Posted => return Ok(PublishOutcome::skipped("already posted")),
            SlotStatus::Error => {
                let reason = row.error.unwrap_or_else(|| "slot failed".to_string());
                return Ok(PublishOutcome::skipped(format!("slot in error: {}", reason)));
            }
            SlotStatus::Planned => {}
        }

        let Some(item) = self.store.get_item(&row.guid).await? else {
            let error = "item not found".to_string();
            self.store.mark_queue_error(day, slot, &error).await?;
            tracing::error!(%day, %slot, guid = %row.guid, "Queued item missing");
            return Ok(PublishOutcome::Failed { error });
        };

        let text = if row.post_text.trim().is_empty() {
            self.writer.rewrite(&item).await
        } else {
            row.post_text
        };
        let html = self.renderer.render_html(&text);

        match self.send_with_retries(&target, &html).await {
            Ok(sent) => {
                let now = self.clock.now();
                if !self
                    .store
                    .mark_queue_posted(day, slot, sent.message_id, now)
                    .await?
                {
                    tracing::error!(%day, %slot, "Slot left planned state during send");
                }
                self.store.mark_item_posted(&item.guid, &text, now).await?;
                tracing::info!(
                    %day,
                    %slot,
                    guid = %item.guid,
                    message_id = sent.message_id,
                    "Published slot"
                );
                Ok(PublishOutcome::Posted {
                    guid: item.guid,
                    message_id: sent.message_id,
                })
            }
            Err(e) => {
                let error = truncate_chars(&e.to_string(), MAX_ERROR_CHARS);
                self.store.mark_queue_error(day, slot, &error).await?;
                tracing::error!(%day, %slot, error = %e, "Failed to publish slot");
                Ok(PublishOutcome::Failed { error })
            }
        }
    }

    /// Publish the newest unposted item outside the slot schedule
    ///
    /// Items reserved by today's planned slots are left for the scheduler.
    /// Waits for any manual publication already running.
    pub async fn post_one(&self, target: &str) -> Result<PublishOutcome, PublishError> {
        let _guard = self.manual_lock.lock().await;
        self.post_one_locked(target).await
    }

    /// Like [`Self::post_one`], but returns `None` if a manual publication is running
    pub async fn try_post_one(&self, target: &str) -> Result<Option<PublishOutcome>, PublishError> {
        let Ok(_guard) = self.manual_lock.try_lock() else {
            return Ok(None);
        };
        self.post_one_locked(target).await.map(Some)
    }

    async fn post_one_locked(&self, target: &str) -> Result<PublishOutcome, PublishError> {
        let target = target.trim();
        if target.is_empty() {
            return Ok(PublishOutcome::skipped(TARGET_NOT_SET));
        }

        let day = self.today();
        if let Err(e) = self.planner.ensure_daily_queue(day).await {
            tracing::warn!(%day, error = %e, "Planning before manual post failed");
        }

        let Some(item) = self.next_manual_item(day).await? else {
            return Ok(PublishOutcome::skipped("no unposted items"));
        };

        let text = self.writer.rewrite(&item).await;
        let html = self.renderer.render_html(&text);

        match self.send_with_retries(target, &html).await {
            Ok(sent) => {
                self.store
                    .mark_item_posted(&item.guid, &text, self.clock.now())
                    .await?;
                tracing::info!(guid = %item.guid, message_id = sent.message_id, "Published item");
                Ok(PublishOutcome::Posted {
                    guid: item.guid,
                    message_id: sent.message_id,
                })
            }
            Err(e) => {
                tracing::error!(guid = %item.guid, error = %e, "Manual publish failed");
                Ok(PublishOutcome::Failed {
                    error: truncate_chars(&e.to_string(), MAX_ERROR_CHARS),
                })
            }
        }
    }

    /// Newest unposted item not already waiting in one of today's planned slots
    async fn next_manual_item(&self, day: NaiveDate) -> Result<Option<Item>, PublishError> {
        let reserved: HashSet<String> = self
            .store
            .get_queue(day)
            .await?
            .into_iter()
            .filter(|row| row.status == SlotStatus::Planned)
            .map(|row| row.guid)
            .collect();
        if reserved.is_empty() {
            return Ok(self.store.pick_next_unposted().await?);
        }

        Ok(self
            .store
            .list_unposted(reserved.len() + 1)
            .await?
            .into_iter()
            .find(|item| !reserved.contains(&item.guid)))
    }

    async fn send_with_retries(&self, chat_id: &str, html: &str) -> Result<SentMessage, SendError> {
        let mut attempt = 0u32;
        loop {
            match self.sender.send_message(chat_id, html).await {
                Ok(sent) => return Ok(sent),
                Err(e) if e.is_transient() && attempt < self.config.send_retries => {
                    let delay = match &e {
                        SendError::RateLimited(Some(after)) => *after,
                        _ => self.config.retry_backoff * 2u32.saturating_pow(attempt),
                    };
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient send failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Lock serializing publication of one `(day, slot)`
    fn slot_lock(&self, day: NaiveDate, slot: SlotTime) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .slot_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|(d, _), _| *d == day);
        locks
            .entry((day, slot))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
