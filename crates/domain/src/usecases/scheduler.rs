//! Scheduling use case - fires the publisher at each slot's wall-clock time

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::ports::Clock;
use crate::slots::{SlotTime, next_fire};
use crate::usecases::publisher::SlotPublisher;

/// Late fires within this window still run
pub const DEFAULT_MISFIRE_GRACE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Run,
    Misfired { late_by: Duration },
}

/// Whether a fire scheduled at `scheduled` may still run at `now`
pub fn decide(scheduled: DateTime<Utc>, now: DateTime<Utc>, grace: Duration) -> FireDecision {
    let late_by = (now - scheduled).to_std().unwrap_or(Duration::ZERO);
    if late_by <= grace {
        FireDecision::Run
    } else {
        FireDecision::Misfired { late_by }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub timezone: Tz,
    pub slots: Vec<SlotTime>,
    pub misfire_grace: Duration,
}

/// One timer loop per slot; a slot never runs concurrently with itself
pub struct Scheduler {
    publisher: Arc<SlotPublisher>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(publisher: Arc<SlotPublisher>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            publisher,
            clock,
            config,
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        tracing::info!(
            timezone = %self.config.timezone,
            slots = ?self.config.slots.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            "Scheduler started"
        );

        let loops = self
            .config
            .slots
            .iter()
            .map(|slot| self.slot_loop(*slot, shutdown.clone()));
        futures::future::join_all(loops).await;

        tracing::info!("Scheduler stopped");
    }

    async fn slot_loop(&self, slot: SlotTime, mut shutdown: watch::Receiver<bool>) {
        let tz = self.config.timezone;
        let mut scheduled = next_fire(slot, &tz, self.clock.now());
        tracing::debug!(%slot, next = %scheduled, "Slot armed");

        loop {
            if *shutdown.borrow() {
                return;
            }

            let wait = (scheduled - self.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => return,
            }

            let now = self.clock.now();
            if now < scheduled {
                continue;
            }

            match decide(scheduled, now, self.config.misfire_grace) {
                FireDecision::Run => {
                    tokio::select! {
                        result = self.publisher.post_scheduled(slot) => match result {
                            Ok(outcome) => tracing::info!(%slot, %outcome, "Slot fired"),
                            Err(e) => tracing::error!(%slot, error = %e, "Slot job failed"),
                        },
                        _ = shutdown.changed() => return,
                    }
                }
                FireDecision::Misfired { late_by } => {
                    tracing::warn!(%slot, late_secs = late_by.as_secs(), "Missed slot fire, skipping");
                }
            }

            // Fires missed while the job ran collapse into the next one.
            let after = self.clock.now().max(scheduled);
            scheduled = next_fire(slot, &tz, after);
            tracing::debug!(%slot, next = %scheduled, "Slot re-armed");
        }
    }
}
