//! Builds the object graph shared by every command

use anyhow::{Context, Result};
use newsroom_adapters::{
    feed_http::HttpFeedSource,
    llm::{LlmConfig, OllamaBackend, OpenAiBackend},
    store::SqliteStore,
    telegram::TelegramBot,
};
use newsroom_domain::{
    Clock, LlmBackend, Store, SystemClock,
    usecases::{
        Critic, IngestConfig, Ingestor, LlmClient, Planner, PlannerConfig, PublisherConfig,
        Reviser, SlotPublisher, TARGET_CHAT_SETTING, Writer,
    },
};
use std::sync::Arc;

use crate::config::AppConfig;

pub struct App {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub bot: Arc<TelegramBot>,
    pub ingestor: Arc<Ingestor>,
    pub planner: Arc<Planner>,
    pub publisher: Arc<SlotPublisher>,
    pub clock: Arc<dyn Clock>,
}

impl App {
    pub async fn build(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::new(&config.db_path)
                .await
                .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let bot = Arc::new(TelegramBot::new(config.telegram_bot_token.clone()));

        let timeout_secs = config.llm_timeout.as_secs();
        let local: Arc<dyn LlmBackend> = Arc::new(OllamaBackend::with_base_url(
            config.ollama_base_url.clone(),
            LlmConfig::with_model(&config.ollama_model, timeout_secs),
        ));
        let cloud: Option<Arc<dyn LlmBackend>> = config.openai_api_key.clone().map(|key| {
            Arc::new(OpenAiBackend::with_base_url(
                Some(key),
                config.openai_base_url.clone(),
                LlmConfig::with_model(&config.openai_model, timeout_secs),
            )) as Arc<dyn LlmBackend>
        });
        if cloud.is_none() {
            tracing::info!("OPENAI_API_KEY not set, cloud LLM fallback disabled");
        }

        let llm = Arc::new(LlmClient::new(
            Some(local),
            cloud,
            config.prefer_ollama,
            config.llm_timeout,
        ));

        let writer = Arc::new(Writer::new(llm.clone(), config.lang.clone()));
        let critic = Arc::new(Critic::new(llm.clone(), config.lang.clone()));
        let reviser = Arc::new(Reviser::new(llm, config.lang.clone()));

        let ingestor = Arc::new(Ingestor::new(
            Arc::new(HttpFeedSource::new()),
            store.clone(),
            IngestConfig {
                feeds: config.feeds.clone(),
                ..Default::default()
            },
        ));

        let planner = Arc::new(Planner::new(
            store.clone(),
            ingestor.clone(),
            writer.clone(),
            critic,
            reviser,
            clock.clone(),
            PlannerConfig {
                post_times: config.post_times.clone(),
                max_posts_per_day: config.max_posts_per_day,
                enable_review: config.enable_review,
                ..Default::default()
            },
            config.llm_timeout,
        ));

        let publisher = Arc::new(SlotPublisher::new(
            store.clone(),
            planner.clone(),
            writer,
            bot.clone(),
            clock.clone(),
            PublisherConfig {
                timezone: config.timezone,
                default_target: config.target_chat_id.clone(),
                send_retries: config.chat_send_retries,
                ..Default::default()
            },
        ));

        Ok(Self {
            config,
            store,
            bot,
            ingestor,
            planner,
            publisher,
            clock,
        })
    }

    /// Persist `TARGET_CHAT_ID` as the target setting when configured
    pub async fn seed_target(&self) -> Result<()> {
        if let Some(target) = &self.config.target_chat_id {
            self.store
                .setting_set(TARGET_CHAT_SETTING, target)
                .await
                .context("Failed to store target chat")?;
            tracing::info!(target = %target, "Seeded target chat from configuration");
        }
        Ok(())
    }
}
