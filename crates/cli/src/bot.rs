//! Chat command handling and the update polling loop

use anyhow::Result;
use chrono::Duration as ChronoDuration;
use newsroom_adapters::telegram::TelegramBot;
use newsroom_domain::{
    Clock, SlotTime, Store,
    usecases::{Planner, PublishOutcome, SlotPublisher, TARGET_CHAT_SETTING},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);
const METRICS_SNAPSHOTS: usize = 5;

const HELP: &str = "AI news bot\n\n\
Commands:\n\
/settarget [chat_id] - publish to this chat, or to the given id\n\
/status - target, timezone, slots and today's queue\n\
/postnow - publish one item now\n\
/plan - plan today's queue, re-planning failed slots\n\
/metrics - publication stats";

/// A recognized bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    SetTarget(Option<String>),
    Status,
    PostNow,
    Plan,
    Metrics,
}

impl ChatCommand {
    /// Parse `/cmd args` or `/cmd@bot args`
    ///
    /// Commands addressed to another bot, unknown commands and plain text
    /// yield `None`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };

        let name = match head.split_once('@') {
            Some((name, addressee)) => {
                if let Some(me) = bot_username {
                    if !addressee.eq_ignore_ascii_case(me) {
                        return None;
                    }
                }
                name
            }
            None => head,
        };

        match name.to_ascii_lowercase().as_str() {
            "start" | "help" => Some(ChatCommand::Start),
            "settarget" => Some(ChatCommand::SetTarget(
                args.split_whitespace().next().map(str::to_string),
            )),
            "status" => Some(ChatCommand::Status),
            "postnow" => Some(ChatCommand::PostNow),
            "plan" => Some(ChatCommand::Plan),
            "metrics" => Some(ChatCommand::Metrics),
            _ => None,
        }
    }
}

/// Executes chat commands against the store and use cases
pub struct CommandHandler {
    store: Arc<dyn Store>,
    planner: Arc<Planner>,
    publisher: Arc<SlotPublisher>,
    clock: Arc<dyn Clock>,
    slots: Vec<SlotTime>,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn Store>,
        planner: Arc<Planner>,
        publisher: Arc<SlotPublisher>,
        clock: Arc<dyn Clock>,
        slots: Vec<SlotTime>,
    ) -> Self {
        Self {
            store,
            planner,
            publisher,
            clock,
            slots,
        }
    }

    /// Run `command` sent from `chat_id` and produce the reply text
    pub async fn handle(&self, command: &ChatCommand, chat_id: i64) -> Result<String> {
        match command {
            ChatCommand::Start => Ok(HELP.to_string()),
            ChatCommand::SetTarget(explicit) => {
                let target = explicit.clone().unwrap_or_else(|| chat_id.to_string());
                self.store.setting_set(TARGET_CHAT_SETTING, &target).await?;
                tracing::info!(target = %target, "Target chat updated");
                Ok(format!("OK. target_chat_id = {}", target))
            }
            ChatCommand::Status => self.status().await,
            ChatCommand::PostNow => {
                let target = self
                    .publisher
                    .resolve_target()
                    .await?
                    .unwrap_or_else(|| chat_id.to_string());
                let outcome = self.publisher.post_one(&target).await?;
                Ok(match outcome {
                    PublishOutcome::Posted { message_id, .. } => {
                        format!("Posted (message_id={})", message_id)
                    }
                    other => format!("Nothing posted: {}", other),
                })
            }
            ChatCommand::Plan => {
                let day = self.publisher.today();
                let outcome = self.planner.replan_failed(day).await?;
                Ok(format!("planned={} {}", outcome.did_plan(), outcome))
            }
            ChatCommand::Metrics => self.metrics().await,
        }
    }

    async fn status(&self) -> Result<String> {
        let target = self
            .publisher
            .resolve_target()
            .await?
            .unwrap_or_else(|| "(not set)".to_string());
        let day = self.publisher.today();
        let queue = self.store.get_queue(day).await?;

        let mut lines = vec![
            format!("target_chat_id: {}", target),
            format!("timezone: {}", self.publisher.timezone()),
            format!(
                "post_times: {}",
                self.slots
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            format!("queue {}: {} slots", day, queue.len()),
        ];
        lines.extend(queue.iter().map(|row| {
            let mut line = format!("- {} {} {}", row.slot, row.status, row.format);
            if let Some(error) = &row.error {
                line.push_str(&format!(" ({})", error));
            }
            line
        }));

        Ok(lines.join("\n"))
    }

    async fn metrics(&self) -> Result<String> {
        let since = self.clock.now() - ChronoDuration::hours(24);
        let summary = self.store.metrics_summary(since).await?;

        let mut lines = vec![
            format!("total_posts: {}", summary.total_posts),
            format!("posts_last_24h: {}", summary.posts_last_24h),
        ];
        if !summary.top_sources.is_empty() {
            lines.push("top sources:".to_string());
            lines.extend(
                summary
                    .top_sources
                    .iter()
                    .map(|s| format!("- {}: {}", s.source, s.count)),
            );
        }

        if let Some(target) = self.publisher.resolve_target().await? {
            let snapshots = self.store.latest_metrics(&target, METRICS_SNAPSHOTS).await?;
            if !snapshots.is_empty() {
                lines.push("latest snapshots:".to_string());
                lines.extend(snapshots.iter().map(|m| {
                    format!(
                        "- #{} views={} forwards={} replies={}",
                        m.message_id, m.views, m.forwards, m.replies
                    )
                }));
            }
        }

        Ok(lines.join("\n"))
    }
}

/// Long-poll for updates and answer commands until shutdown
pub async fn run_polling(
    bot: Arc<TelegramBot>,
    handler: Arc<CommandHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    let username = match bot.get_me().await {
        Ok(me) => me.username,
        Err(e) => {
            tracing::warn!(error = %e, "getMe failed, accepting commands for any bot name");
            None
        }
    };
    tracing::info!(username = ?username, "Bot polling started");

    let mut offset: Option<i64> = None;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let updates = tokio::select! {
            _ = shutdown.changed() => break,
            result = bot.get_updates(offset, POLL_TIMEOUT_SECS) => result,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.any_message() else {
                continue;
            };
            let Some(command) = message
                .text
                .as_deref()
                .and_then(|text| ChatCommand::parse(text, username.as_deref()))
            else {
                continue;
            };

            let chat_id = message.chat.id;
            tracing::info!(chat_id, command = ?command, "Handling command");

            let reply = match handler.handle(&command, chat_id).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(chat_id, error = %e, "Command failed");
                    format!("Error: {}", e)
                }
            };

            if let Err(e) = bot.reply(chat_id, &reply).await {
                tracing::warn!(chat_id, error = %e, "Failed to reply");
            }
        }
    }

    tracing::info!("Bot polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use newsroom_adapters::{
        feed_http::StubFeedSource, llm::StubLlm, store::InMemoryStore, telegram::StubChatSender,
    };
    use newsroom_domain::{
        NewItem, PostFormat, QueueSlotDraft,
        usecases::{
            Critic, IngestConfig, Ingestor, LlmClient, PlannerConfig, PublisherConfig, Reviser,
            Writer,
        },
    };

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        sender: Arc<StubChatSender>,
        handler: CommandHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let sender = Arc::new(StubChatSender::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 7, 1, 6, 0, 0).unwrap(),
        ));
        let llm = Arc::new(LlmClient::new(
            Some(Arc::new(StubLlm::fixed("Fresh AI agent news"))),
            None,
            true,
            Duration::from_secs(5),
        ));
        let writer = Arc::new(Writer::new(llm.clone(), "en"));
        let slots: Vec<SlotTime> = vec!["09:00".parse().unwrap(), "12:00".parse().unwrap()];
        let ingestor = Arc::new(Ingestor::new(
            Arc::new(StubFeedSource::new()),
            store.clone(),
            IngestConfig::default(),
        ));
        let planner = Arc::new(Planner::new(
            store.clone(),
            ingestor,
            writer.clone(),
            Arc::new(Critic::new(llm.clone(), "en")),
            Arc::new(Reviser::new(llm, "en")),
            clock.clone(),
            PlannerConfig {
                post_times: slots.clone(),
                max_posts_per_day: 2,
                ..Default::default()
            },
            Duration::from_secs(5),
        ));
        let publisher = Arc::new(SlotPublisher::new(
            store.clone(),
            planner.clone(),
            writer,
            sender.clone(),
            clock.clone(),
            PublisherConfig::default(),
        ));

        Fixture {
            store: store.clone(),
            sender,
            handler: CommandHandler::new(store, planner, publisher, clock, slots),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ChatCommand::parse("/start", None), Some(ChatCommand::Start));
        assert_eq!(
            ChatCommand::parse("/settarget @ai_news", None),
            Some(ChatCommand::SetTarget(Some("@ai_news".to_string())))
        );
        assert_eq!(
            ChatCommand::parse("/settarget", None),
            Some(ChatCommand::SetTarget(None))
        );
        assert_eq!(
            ChatCommand::parse("/postnow@NewsBot", Some("newsbot")),
            Some(ChatCommand::PostNow)
        );
        assert_eq!(ChatCommand::parse("/postnow@OtherBot", Some("newsbot")), None);
        assert_eq!(ChatCommand::parse("/unknown", None), None);
        assert_eq!(ChatCommand::parse("hello /status", None), None);
        assert_eq!(ChatCommand::parse("  /STATUS  ", None), Some(ChatCommand::Status));
    }

    #[tokio::test]
    async fn test_settarget_defaults_to_current_chat() {
        let f = fixture();

        let reply = f
            .handler
            .handle(&ChatCommand::SetTarget(None), -100_555)
            .await
            .unwrap();

        assert!(reply.contains("-100555"));
        assert_eq!(
            f.store.setting_get(TARGET_CHAT_SETTING).await.unwrap(),
            Some("-100555".to_string())
        );
    }

    #[tokio::test]
    async fn test_status_lists_queue() {
        let f = fixture();
        let day = chrono::NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        f.store
            .upsert_queue_slot(&QueueSlotDraft {
                day,
                slot: "09:00".parse().unwrap(),
                guid: "g1".to_string(),
                format: PostFormat::BreakingNews,
                alt_title_1: String::new(),
                alt_title_2: String::new(),
                post_text: "text".to_string(),
                created_at: Utc.with_ymd_and_hms(2026, 7, 1, 5, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        let reply = f.handler.handle(&ChatCommand::Status, 1).await.unwrap();

        assert!(reply.contains("target_chat_id: (not set)"));
        assert!(reply.contains("timezone: UTC"));
        assert!(reply.contains("post_times: 09:00, 12:00"));
        assert!(reply.contains("queue 2026-07-01: 1 slots"));
        assert!(reply.contains("- 09:00 planned"));
    }

    #[tokio::test]
    async fn test_postnow_falls_back_to_current_chat() {
        let f = fixture();
        for (guid, hour) in [("g1", 5), ("g2", 4), ("g3", 3)] {
            f.store
                .upsert_item(&NewItem {
                    guid: guid.to_string(),
                    source: "OpenAI".to_string(),
                    title: "New agent SDK".to_string(),
                    link: format!("https://openai.com/news/{}", guid),
                    published: format!("2026-07-01T0{}:00:00Z", hour),
                    summary: "Agents".to_string(),
                })
                .await
                .unwrap();
        }

        let reply = f.handler.handle(&ChatCommand::PostNow, 42).await.unwrap();

        assert!(reply.starts_with("Posted"));
        let delivered = f.sender.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "42");

        // Both slots got planned first; the manual post takes the item left over
        let day = chrono::NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let queued: Vec<String> = f
            .store
            .get_queue(day)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.guid)
            .collect();
        assert_eq!(queued, vec!["g1", "g2"]);
        assert!(f.store.get_item("g3").await.unwrap().unwrap().posted_at.is_some());
    }

    #[tokio::test]
    async fn test_metrics_on_empty_store() {
        let f = fixture();

        let reply = f.handler.handle(&ChatCommand::Metrics, 1).await.unwrap();

        assert!(reply.contains("total_posts: 0"));
        assert!(reply.contains("posts_last_24h: 0"));
    }
}
