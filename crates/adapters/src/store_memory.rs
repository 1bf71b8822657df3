//! In-memory store for testing and offline mode

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use newsroom_domain::{
    Item, MAX_ERROR_CHARS, MetricsSnapshot, MetricsSummary, NewItem, QueueSlot, QueueSlotDraft,
    RecentPost, SlotStatus, SlotTime, SourceCount, Store, StoreError, text::truncate_chars,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    /// Insertion order is the tie-breaker for equal `published`
    items: Vec<Item>,
    queue: BTreeMap<(NaiveDate, SlotTime), QueueSlot>,
    settings: HashMap<String, String>,
    metrics: Vec<MetricsSnapshot>,
}

/// In-memory store implementation
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_item(&self, item: &NewItem) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        if tables.items.iter().any(|existing| existing.guid == item.guid) {
            return Ok(false);
        }
        tables.items.push(Item {
            guid: item.guid.clone(),
            source: item.source.clone(),
            title: item.title.clone(),
            link: item.link.clone(),
            published: item.published.clone(),
            summary: item.summary.clone(),
            rewritten: None,
            posted_at: None,
        });
        Ok(true)
    }

    async fn list_unposted(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let tables = self.read()?;
        let mut unposted: Vec<(usize, &Item)> = tables
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.posted_at.is_none())
            .collect();

        // Newest published first, empty last, later insertion first on ties
        unposted.sort_by(|(ia, a), (ib, b)| {
            a.published
                .is_empty()
                .cmp(&b.published.is_empty())
                .then_with(|| b.published.cmp(&a.published))
                .then_with(|| ib.cmp(ia))
        });

        Ok(unposted
            .into_iter()
            .take(limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn get_item(&self, guid: &str) -> Result<Option<Item>, StoreError> {
        let tables = self.read()?;
        Ok(tables.items.iter().find(|item| item.guid == guid).cloned())
    }

    async fn mark_item_posted(
        &self,
        guid: &str,
        rewritten: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let item = tables
            .items
            .iter_mut()
            .find(|item| item.guid == guid)
            .ok_or_else(|| StoreError::NotFound(format!("item {}", guid)))?;
        item.rewritten = Some(rewritten.to_string());
        item.posted_at = Some(posted_at);
        Ok(())
    }

    async fn count_items(&self) -> Result<i64, StoreError> {
        Ok(self.read()?.items.len() as i64)
    }

    async fn upsert_queue_slot(&self, draft: &QueueSlotDraft) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let key = (draft.day, draft.slot);
        if tables
            .queue
            .get(&key)
            .is_some_and(|row| row.status == SlotStatus::Posted)
        {
            return Ok(false);
        }
        tables.queue.insert(
            key,
            QueueSlot {
                day: draft.day,
                slot: draft.slot,
                guid: draft.guid.clone(),
                format: draft.format,
                alt_title_1: draft.alt_title_1.clone(),
                alt_title_2: draft.alt_title_2.clone(),
                post_text: draft.post_text.clone(),
                status: SlotStatus::Planned,
                tg_message_id: None,
                error: None,
                created_at: draft.created_at,
                posted_at: None,
            },
        );
        Ok(true)
    }

    async fn get_queue_slot(
        &self,
        day: NaiveDate,
        slot: SlotTime,
    ) -> Result<Option<QueueSlot>, StoreError> {
        Ok(self.read()?.queue.get(&(day, slot)).cloned())
    }

    async fn get_queue(&self, day: NaiveDate) -> Result<Vec<QueueSlot>, StoreError> {
        Ok(self
            .read()?
            .queue
            .values()
            .filter(|row| row.day == day)
            .cloned()
            .collect())
    }

    async fn mark_queue_posted(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        message_id: i64,
        posted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        match tables.queue.get_mut(&(day, slot)) {
            Some(row) if row.status == SlotStatus::Planned => {
                row.status = SlotStatus::Posted;
                row.tg_message_id = Some(message_id);
                row.posted_at = Some(posted_at);
                row.error = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_queue_error(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        error: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        match tables.queue.get_mut(&(day, slot)) {
            Some(row) if row.status == SlotStatus::Planned => {
                row.status = SlotStatus::Error;
                row.error = Some(truncate_chars(error, MAX_ERROR_CHARS));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn setting_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.settings.get(key).cloned())
    }

    async fn setting_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write()?
            .settings
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<RecentPost>, StoreError> {
        let tables = self.read()?;
        let mut posts: Vec<RecentPost> = tables
            .items
            .iter()
            .filter_map(|item| {
                item.posted_at.map(|posted_at| RecentPost {
                    source: item.source.clone(),
                    title: item.title.clone(),
                    link: item.link.clone(),
                    posted_at,
                })
            })
            .collect();
        posts.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        posts.truncate(limit);
        Ok(posts)
    }

    async fn metrics_summary(&self, since: DateTime<Utc>) -> Result<MetricsSummary, StoreError> {
        let tables = self.read()?;
        let posted: Vec<&Item> = tables
            .items
            .iter()
            .filter(|item| item.posted_at.is_some())
            .collect();

        let mut by_source: HashMap<&str, i64> = HashMap::new();
        for item in &posted {
            *by_source.entry(item.source.as_str()).or_default() += 1;
        }
        let mut top_sources: Vec<SourceCount> = by_source
            .into_iter()
            .map(|(source, count)| SourceCount {
                source: source.to_string(),
                count,
            })
            .collect();
        top_sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
        top_sources.truncate(10);

        Ok(MetricsSummary {
            total_posts: posted.len() as i64,
            posts_last_24h: posted
                .iter()
                .filter(|item| item.posted_at.is_some_and(|at| at >= since))
                .count() as i64,
            top_sources,
        })
    }

    async fn add_metric_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError> {
        self.write()?.metrics.push(snapshot.clone());
        Ok(())
    }

    async fn list_recent_posted_message_ids(
        &self,
        day: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError> {
        let tables = self.read()?;
        let mut posted: Vec<&QueueSlot> = tables
            .queue
            .values()
            .filter(|row| row.status == SlotStatus::Posted)
            .filter(|row| day.is_none_or(|d| row.day == d))
            .collect();
        posted.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(posted
            .into_iter()
            .filter_map(|row| row.tg_message_id)
            .take(limit)
            .collect())
    }

    async fn latest_metrics(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<MetricsSnapshot>, StoreError> {
        let tables = self.read()?;
        let mut rows: Vec<MetricsSnapshot> = tables
            .metrics
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
