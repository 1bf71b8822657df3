//! SQLite store implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use newsroom_domain::{
    Item, MAX_ERROR_CHARS, MetricsSnapshot, MetricsSummary, NewItem, QueueSlot, QueueSlotDraft,
    RecentPost, SlotTime, SourceCount, Store, StoreError, format_day, format_timestamp,
    parse_day, parse_timestamp, text::truncate_chars,
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

type ItemRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

type QueueRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    String,
    Option<String>,
);

type MetricsRow = (String, i64, String, i64, i64, i64, String);

const ITEM_COLUMNS: &str =
    "guid, source, title, link, published, summary, rewritten, posted_at";

const QUEUE_COLUMNS: &str = "day, slot, guid, format, alt_title_1, alt_title_2, post_text, \
                             status, tg_message_id, error, created_at, posted_at";

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize the schema
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid TEXT NOT NULL UNIQUE,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                published TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                rewritten TEXT,
                posted_at TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                day TEXT NOT NULL,
                slot TEXT NOT NULL,
                guid TEXT NOT NULL,
                format TEXT NOT NULL,
                alt_title_1 TEXT NOT NULL,
                alt_title_2 TEXT NOT NULL,
                post_text TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'planned',
                tg_message_id INTEGER,
                error TEXT,
                created_at TEXT NOT NULL,
                posted_at TEXT,
                UNIQUE(day, slot)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                captured_at TEXT NOT NULL,
                chat_id TEXT NOT NULL,
                message_id INTEGER NOT NULL,
                views INTEGER NOT NULL DEFAULT 0,
                forwards INTEGER NOT NULL DEFAULT 0,
                replies INTEGER NOT NULL DEFAULT 0,
                reactions_json TEXT NOT NULL DEFAULT '{}'
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_metrics_message
            ON metrics(chat_id, message_id, captured_at)
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_items_unposted
            ON items(posted_at, published)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(())
    }
}

fn to_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    parse_timestamp(value).map_err(|e| StoreError::Serialization(format!("{}: {}", value, e)))
}

fn to_item(row: ItemRow) -> Result<Item, StoreError> {
    let (guid, source, title, link, published, summary, rewritten, posted_at) = row;
    Ok(Item {
        guid,
        source,
        title,
        link,
        published,
        summary,
        rewritten,
        posted_at: posted_at.as_deref().map(to_timestamp).transpose()?,
    })
}

fn to_queue_slot(row: QueueRow) -> Result<QueueSlot, StoreError> {
    let (
        day,
        slot,
        guid,
        format,
        alt_title_1,
        alt_title_2,
        post_text,
        status,
        tg_message_id,
        error,
        created_at,
        posted_at,
    ) = row;

    Ok(QueueSlot {
        day: parse_day(&day).map_err(|e| StoreError::Serialization(e.to_string()))?,
        slot: slot
            .parse()
            .map_err(|e: newsroom_domain::slots::InvalidSlotTime| {
                StoreError::Serialization(e.to_string())
            })?,
        guid,
        format: format.parse().map_err(StoreError::Serialization)?,
        alt_title_1,
        alt_title_2,
        post_text,
        status: status.parse().map_err(StoreError::Serialization)?,
        tg_message_id,
        error,
        created_at: to_timestamp(&created_at)?,
        posted_at: posted_at.as_deref().map(to_timestamp).transpose()?,
    })
}

fn to_snapshot(row: MetricsRow) -> Result<MetricsSnapshot, StoreError> {
    let (chat_id, message_id, captured_at, views, forwards, replies, reactions_json) = row;
    Ok(MetricsSnapshot {
        chat_id,
        message_id,
        captured_at: to_timestamp(&captured_at)?,
        views,
        forwards,
        replies,
        reactions_json,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_item(&self, item: &NewItem) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO items (guid, source, title, link, published, summary)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(guid) DO NOTHING
            "#,
        )
        .bind(&item.guid)
        .bind(&item.source)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.published)
        .bind(&item.summary)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_unposted(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ITEM_COLUMNS} FROM items
            WHERE posted_at IS NULL
            ORDER BY (published = '') ASC, published DESC, id DESC
            LIMIT ?
            "#
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(to_item).collect()
    }

    async fn get_item(&self, guid: &str) -> Result<Option<Item>, StoreError> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE guid = ?"))
                .bind(guid)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(to_item).transpose()
    }

    async fn mark_item_posted(
        &self,
        guid: &str,
        rewritten: &str,
        posted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE items SET rewritten = ?, posted_at = ? WHERE guid = ?")
            .bind(rewritten)
            .bind(format_timestamp(posted_at))
            .bind(guid)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {}", guid)));
        }
        Ok(())
    }

    async fn count_items(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(count.0)
    }

    async fn upsert_queue_slot(&self, draft: &QueueSlotDraft) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO queue
            (day, slot, guid, format, alt_title_1, alt_title_2, post_text, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'planned', ?)
            ON CONFLICT(day, slot) DO UPDATE SET
                guid = excluded.guid,
                format = excluded.format,
                alt_title_1 = excluded.alt_title_1,
                alt_title_2 = excluded.alt_title_2,
                post_text = excluded.post_text,
                status = 'planned',
                error = NULL,
                tg_message_id = NULL,
                posted_at = NULL,
                created_at = excluded.created_at
            WHERE queue.status != 'posted'
            "#,
        )
        .bind(format_day(draft.day))
        .bind(draft.slot.to_string())
        .bind(&draft.guid)
        .bind(draft.format.as_str())
        .bind(&draft.alt_title_1)
        .bind(&draft.alt_title_2)
        .bind(&draft.post_text)
        .bind(format_timestamp(draft.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_queue_slot(
        &self,
        day: NaiveDate,
        slot: SlotTime,
    ) -> Result<Option<QueueSlot>, StoreError> {
        let row: Option<QueueRow> = sqlx::query_as(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue WHERE day = ? AND slot = ?"
        ))
        .bind(format_day(day))
        .bind(slot.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(to_queue_slot).transpose()
    }

    async fn get_queue(&self, day: NaiveDate) -> Result<Vec<QueueSlot>, StoreError> {
        let rows: Vec<QueueRow> = sqlx::query_as(&format!(
            "SELECT {QUEUE_COLUMNS} FROM queue WHERE day = ? ORDER BY slot ASC"
        ))
        .bind(format_day(day))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(to_queue_slot).collect()
    }

    async fn mark_queue_posted(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        message_id: i64,
        posted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE queue SET status = 'posted', tg_message_id = ?, posted_at = ?, error = NULL
            WHERE day = ? AND slot = ? AND status = 'planned'
            "#,
        )
        .bind(message_id)
        .bind(format_timestamp(posted_at))
        .bind(format_day(day))
        .bind(slot.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_queue_error(
        &self,
        day: NaiveDate,
        slot: SlotTime,
        error: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE queue SET status = 'error', error = ?
            WHERE day = ? AND slot = ? AND status = 'planned'
            "#,
        )
        .bind(truncate_chars(error, MAX_ERROR_CHARS))
        .bind(format_day(day))
        .bind(slot.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn setting_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(row.map(|(value,)| value))
    }

    async fn setting_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn recent_posts(&self, limit: usize) -> Result<Vec<RecentPost>, StoreError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT source, title, link, posted_at FROM items
            WHERE posted_at IS NOT NULL
            ORDER BY posted_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(source, title, link, posted_at)| {
                Ok(RecentPost {
                    source,
                    title,
                    link,
                    posted_at: to_timestamp(&posted_at)?,
                })
            })
            .collect()
    }

    async fn metrics_summary(&self, since: DateTime<Utc>) -> Result<MetricsSummary, StoreError> {
        let (total_posts, posts_last_24h): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN posted_at >= ? THEN 1 ELSE 0 END), 0)
            FROM items
            WHERE posted_at IS NOT NULL
            "#,
        )
        .bind(format_timestamp(since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let sources: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT source, COUNT(*) AS posts FROM items
            WHERE posted_at IS NOT NULL
            GROUP BY source
            ORDER BY posts DESC, source ASC
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(MetricsSummary {
            total_posts,
            posts_last_24h,
            top_sources: sources
                .into_iter()
                .map(|(source, count)| SourceCount { source, count })
                .collect(),
        })
    }

    async fn add_metric_snapshot(&self, snapshot: &MetricsSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metrics
            (captured_at, chat_id, message_id, views, forwards, replies, reactions_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(format_timestamp(snapshot.captured_at))
        .bind(&snapshot.chat_id)
        .bind(snapshot.message_id)
        .bind(snapshot.views)
        .bind(snapshot.forwards)
        .bind(snapshot.replies)
        .bind(&snapshot.reactions_json)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_recent_posted_message_ids(
        &self,
        day: Option<NaiveDate>,
        limit: usize,
    ) -> Result<Vec<i64>, StoreError> {
        let day = day.map(format_day);
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT tg_message_id FROM queue
            WHERE status = 'posted' AND tg_message_id IS NOT NULL
              AND (?1 IS NULL OR day = ?1)
            ORDER BY posted_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(day)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn latest_metrics(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<Vec<MetricsSnapshot>, StoreError> {
        let rows: Vec<MetricsRow> = sqlx::query_as(
            r#"
            SELECT chat_id, message_id, captured_at, views, forwards, replies, reactions_json
            FROM metrics
            WHERE chat_id = ?
            ORDER BY captured_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(chat_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter().map(to_snapshot).collect()
    }
}
