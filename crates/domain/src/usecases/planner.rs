//! Daily planning use case - fills the day's queue slots from ranked candidates

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::model::{Item, QueueSlot, QueueSlotDraft, SlotStatus};
use crate::ports::{Clock, Store, StoreError};
use crate::ranker::{self, Bucket};
use crate::slots::SlotTime;
use crate::usecases::agents::{Critic, Orchestrator, Reviser, Writer};
use crate::usecases::ingest::Ingestor;

/// Lower bound of the review budget
pub const MIN_REVIEW_BUDGET: Duration = Duration::from_secs(6);

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration for the planner
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Configured post times, in order
    pub post_times: Vec<SlotTime>,
    pub max_posts_per_day: usize,
    /// Run critic and reviser on each draft
    pub enable_review: bool,
    /// Unposted items considered per pass
    pub candidate_limit: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            post_times: vec![],
            max_posts_per_day: crate::slots::MAX_SLOTS_PER_DAY,
            enable_review: false,
            candidate_limit: 300,
        }
    }
}

impl PlannerConfig {
    /// `post_times[0 : max_posts_per_day]`
    pub fn active_slots(&self) -> Vec<SlotTime> {
        self.post_times
            .iter()
            .take(self.max_posts_per_day)
            .copied()
            .collect()
    }
}

/// Result of a planning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    AlreadyPlanned,
    Planned { feeds_added: usize, planned: usize },
}

impl PlanOutcome {
    pub fn did_plan(&self) -> bool {
        matches!(self, PlanOutcome::Planned { .. })
    }
}

impl fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanOutcome::AlreadyPlanned => f.write_str("already planned"),
            PlanOutcome::Planned {
                feeds_added,
                planned,
            } => write!(f, "feeds_added={}, planned={}", feeds_added, planned),
        }
    }
}

/// A ranked unposted item
#[derive(Debug, Clone)]
pub struct Candidate {
    pub item: Item,
    pub score: i64,
    pub bucket: Bucket,
}

impl Candidate {
    pub fn new(item: Item) -> Self {
        let score = ranker::score(&item.title, &item.summary, &item.source);
        let bucket = ranker::bucket(&item.title, &item.summary);
        Self {
            item,
            score,
            bucket,
        }
    }
}

/// Rank items by score, keeping pool order among equal scores
pub fn rank_candidates(items: Vec<Item>) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = items.into_iter().map(Candidate::new).collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Index of the candidate to use for a slot
///
/// Preference tiers: preferred bucket from an unused source, then any unused
/// source, then the best remaining candidate.
pub fn select_candidate(
    ranked: &[Candidate],
    preferred: Bucket,
    used_sources: &HashSet<String>,
) -> Option<usize> {
    let fresh = |c: &Candidate| !used_sources.contains(&c.item.source);

    ranked
        .iter()
        .position(|c| c.bucket == preferred && fresh(c))
        .or_else(|| ranked.iter().position(fresh))
        .or(if ranked.is_empty() { None } else { Some(0) })
}

pub struct Planner {
    store: Arc<dyn Store>,
    ingestor: Arc<Ingestor>,
    writer: Arc<Writer>,
    critic: Arc<Critic>,
    reviser: Arc<Reviser>,
    clock: Arc<dyn Clock>,
    config: PlannerConfig,
    review_budget: Duration,
    lock: Mutex<()>,
}

impl Planner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        ingestor: Arc<Ingestor>,
        writer: Arc<Writer>,
        critic: Arc<Critic>,
        reviser: Arc<Reviser>,
        clock: Arc<dyn Clock>,
        config: PlannerConfig,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            store,
            ingestor,
            writer,
            critic,
            reviser,
            clock,
            config,
            review_budget: llm_timeout.max(MIN_REVIEW_BUDGET),
            lock: Mutex::new(()),
        }
    }

    /// Plan every empty slot of `day`, unless the day is already full
    ///
    /// Idempotent: a second call on a full day changes nothing.
    pub async fn ensure_daily_queue(&self, day: NaiveDate) -> Result<PlanOutcome, PlanError> {
        let _guard = self.lock.lock().await;

        let existing = self.store.get_queue(day).await?;
        if existing.len() >= self.config.max_posts_per_day {
            tracing::debug!(%day, slots = existing.len(), "Queue already planned");
            return Ok(PlanOutcome::AlreadyPlanned);
        }

        let feeds_added = self.ingestor.sweep().await;
        let planned = self.plan_pass(day, existing, false).await?;
        Ok(PlanOutcome::Planned {
            feeds_added,
            planned,
        })
    }

    /// Like [`Self::ensure_daily_queue`], but also re-plans slots in `error`
    ///
    /// Posted slots are never touched.
    pub async fn replan_failed(&self, day: NaiveDate) -> Result<PlanOutcome, PlanError> {
        let _guard = self.lock.lock().await;

        let existing = self.store.get_queue(day).await?;
        let healthy = existing
            .iter()
            .filter(|row| row.status != SlotStatus::Error)
            .count();
        if healthy >= self.config.max_posts_per_day {
            return Ok(PlanOutcome::AlreadyPlanned);
        }

        let feeds_added = self.ingestor.sweep().await;
        let planned = self.plan_pass(day, existing, true).await?;
        Ok(PlanOutcome::Planned {
            feeds_added,
            planned,
        })
    }

    async fn plan_pass(
        &self,
        day: NaiveDate,
        existing: Vec<QueueSlot>,
        replace_errors: bool,
    ) -> Result<usize, PlanError> {
        let slots = self.config.active_slots();
        let formats = Orchestrator.pick_formats(&slots);

        let exclude: HashSet<String> = existing.iter().map(|row| row.guid.clone()).collect();
        let mut used_sources = self.sources_in_use(&existing).await?;
        let existing: BTreeMap<SlotTime, SlotStatus> =
            existing.iter().map(|row| (row.slot, row.status)).collect();

        let pool: Vec<Item> = self
            .store
            .list_unposted(self.config.candidate_limit)
            .await?
            .into_iter()
            .filter(|item| !exclude.contains(&item.guid))
            .collect();
        let mut ranked = rank_candidates(pool);

        let mut review_enabled = self.config.enable_review;
        let mut planned = 0;

        for (idx, slot) in slots.iter().enumerate() {
            match existing.get(slot) {
                Some(SlotStatus::Error) if replace_errors => {}
                Some(_) => continue,
                None => {}
            }

            let preferred = Bucket::SLOT_PREFERENCE[idx % Bucket::SLOT_PREFERENCE.len()];
            let Some(pick) = select_candidate(&ranked, preferred, &used_sources) else {
                tracing::info!(%day, %slot, "No candidates left for slot");
                break;
            };
            let candidate = ranked.remove(pick);
            if !candidate.item.source.is_empty() {
                used_sources.insert(candidate.item.source.clone());
            }

            let Some(format) = formats.get(slot).copied() else {
                continue;
            };
            let mut post = self.writer.write(&candidate.item, format).await;

            if review_enabled {
                // Soft deadline: the cycle always completes and its output is kept.
                let started = Instant::now();
                post.post_text = self.review(&post.post_text).await;
                let elapsed = started.elapsed();
                if elapsed > self.review_budget {
                    tracing::warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        budget_secs = self.review_budget.as_secs(),
                        "Review exceeded budget, disabling for this pass"
                    );
                    review_enabled = false;
                }
            }

            let draft = QueueSlotDraft {
                day,
                slot: *slot,
                guid: post.guid,
                format: post.format,
                alt_title_1: post.alt_title_1,
                alt_title_2: post.alt_title_2,
                post_text: post.post_text,
                created_at: self.clock.now(),
            };

            if self.store.upsert_queue_slot(&draft).await? {
                planned += 1;
                tracing::info!(
                    %day,
                    %slot,
                    guid = %draft.guid,
                    format = %draft.format,
                    score = candidate.score,
                    bucket = %candidate.bucket,
                    "Planned slot"
                );
            } else {
                tracing::warn!(%day, %slot, "Slot already posted, draft dropped");
            }
        }

        Ok(planned)
    }

    async fn review(&self, post_text: &str) -> String {
        let critique = self.critic.review(post_text).await;
        self.reviser.revise(post_text, &critique).await
    }

    /// Sources of items already queued today, so a re-plan keeps diversity
    async fn sources_in_use(&self, existing: &[QueueSlot]) -> Result<HashSet<String>, PlanError> {
        let mut sources = HashSet::new();
        for row in existing.iter().filter(|row| row.status != SlotStatus::Error) {
            if let Some(item) = self.store.get_item(&row.guid).await? {
                if !item.source.is_empty() {
                    sources.insert(item.source);
                }
            }
        }
        Ok(sources)
    }
}
