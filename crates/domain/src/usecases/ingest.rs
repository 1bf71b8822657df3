//! Ingestion use case - sweeps configured feeds into the store

use std::sync::Arc;
use std::time::Duration;

use crate::keywords::matches_keywords;
use crate::links::canonicalize_link;
use crate::model::NewItem;
use crate::ports::{FeedEntry, FeedSource, FeedSpec, Store};
use crate::text::strip_tags;

/// Configuration for the ingestor
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub feeds: Vec<FeedSpec>,
    /// Entries considered per feed, from the top of the feed
    pub entries_per_feed: usize,
    /// Pause between two feeds
    pub pace: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            feeds: vec![],
            entries_per_feed: 20,
            pace: Duration::from_millis(200),
        }
    }
}

/// Feed sweeper
pub struct Ingestor {
    source: Arc<dyn FeedSource>,
    store: Arc<dyn Store>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(source: Arc<dyn FeedSource>, store: Arc<dyn Store>, config: IngestConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    /// Fetch every feed once and store matching entries
    ///
    /// Returns the number of insert attempts. Failures are logged per feed
    /// and never abort the sweep.
    pub async fn sweep(&self) -> usize {
        let mut attempts = 0;

        for (idx, feed) in self.config.feeds.iter().enumerate() {
            if idx > 0 && !self.config.pace.is_zero() {
                tokio::time::sleep(self.config.pace).await;
            }

            let fetched = match self.source.fetch(&feed.url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    tracing::warn!(url = %feed.url, error = %e, "Feed fetch failed");
                    continue;
                }
            };

            let source_name = feed
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .or_else(|| fetched.title.clone().filter(|t| !t.trim().is_empty()))
                .unwrap_or_else(|| feed.url.clone());

            let mut stored = 0usize;
            for entry in fetched.entries.iter().take(self.config.entries_per_feed) {
                let Some(item) = to_new_item(&source_name, entry) else {
                    continue;
                };

                match self.store.upsert_item(&item).await {
                    Ok(_) => {
                        attempts += 1;
                        stored += 1;
                    }
                    Err(e) => {
                        tracing::warn!(guid = %item.guid, error = %e, "Failed to store item");
                    }
                }
            }

            tracing::debug!(feed = %source_name, stored, "Feed swept");
        }

        tracing::info!(attempts, feeds = self.config.feeds.len(), "Ingest sweep finished");
        attempts
    }
}

/// Build the store payload for an entry, or `None` if it is off-topic
fn to_new_item(source: &str, entry: &FeedEntry) -> Option<NewItem> {
    let title = entry.title.trim().to_string();
    let summary = strip_tags(&entry.summary);

    if !matches_keywords(&format!("{} {}", title, summary)) {
        return None;
    }

    let link = canonicalize_link(&entry.link);
    let guid = [entry.id.trim(), link.as_str()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}{}", source, title));

    if guid.is_empty() {
        return None;
    }

    Some(NewItem {
        guid,
        source: source.to_string(),
        title,
        link,
        published: entry.published.trim().to_string(),
        summary,
    })
}
