//! Configuration loading and normalization

use anyhow::{Context, Result, bail};
use chrono_tz::Tz;
use newsroom_adapters::llm::{ollama::DEFAULT_OLLAMA_URL, openai::DEFAULT_OPENAI_URL};
use newsroom_domain::{FeedSpec, MAX_SLOTS_PER_DAY, SlotTime, slots::parse_post_times};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_POST_TIMES: &str = "09:00,12:00,15:00,18:00,21:00,00:00";

const DEFAULT_FEEDS: &[(&str, &str)] = &[
    ("OpenAI", "https://openai.com/blog/rss.xml"),
    ("Google AI", "https://blog.google/technology/ai/rss/"),
    ("DeepMind", "https://deepmind.google/discover/blog/rss.xml"),
    ("Hugging Face", "https://huggingface.co/blog/feed.xml"),
    ("Anthropic", "https://www.anthropic.com/news/rss.xml"),
    (
        "The Verge AI",
        "https://www.theverge.com/ai-artificial-intelligence/rss/index.xml",
    ),
    (
        "Ars Technica AI",
        "https://feeds.arstechnica.com/arstechnica/technology-lab",
    ),
];

/// Process role selected by `APP_MODE` or `run --mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AppMode {
    #[default]
    Bot,
    Dashboard,
    Collector,
}

impl FromStr for AppMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "bot" => Ok(AppMode::Bot),
            "dashboard" => Ok(AppMode::Dashboard),
            "collector" => Ok(AppMode::Collector),
            other => bail!("Unknown APP_MODE '{}': expected bot, dashboard or collector", other),
        }
    }
}

/// Settings as read from the env file, the optional config file and the environment
///
/// Everything arrives as a string and is normalized by [`RawConfig::normalize`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    pub telegram_bot_token: Option<String>,
    pub target_chat_id: Option<String>,
    pub app_mode: Option<String>,
    pub dashboard_port: Option<String>,
    pub timezone: Option<String>,
    pub post_times: Option<String>,
    pub max_posts_per_day: Option<String>,
    pub rss_feeds: Option<String>,
    pub lang: Option<String>,
    pub db_path: Option<String>,
    pub ollama_base_url: Option<String>,
    pub ollama_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub llm_timeout_seconds: Option<String>,
    pub prefer_ollama: Option<String>,
    pub enable_review: Option<String>,
    pub chat_send_retries: Option<String>,
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: SecretString,
    pub target_chat_id: Option<String>,
    pub app_mode: AppMode,
    pub dashboard_port: u16,
    pub timezone: Tz,
    pub post_times: Vec<SlotTime>,
    pub max_posts_per_day: usize,
    pub feeds: Vec<FeedSpec>,
    pub lang: String,
    pub db_path: PathBuf,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub llm_timeout: Duration,
    pub prefer_ollama: bool,
    pub enable_review: bool,
    pub chat_send_retries: u32,
}

impl AppConfig {
    /// Load `.env`, then the config file (if any), then the process environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("Failed to read .env file"),
        }

        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(config::Environment::default());

        let raw: RawConfig = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        raw.normalize()
    }

    /// Active slots: configured times capped by the daily maximum
    pub fn active_slots(&self) -> Vec<SlotTime> {
        self.post_times
            .iter()
            .take(self.max_posts_per_day)
            .copied()
            .collect()
    }

    /// Commented env file written by `config init`
    pub fn example_env() -> String {
        format!(
            r#"# newsroom configuration
# Values may also be set in the process environment or a TOML file (--config).

# Required: bot token from @BotFather
TELEGRAM_BOT_TOKEN=

# Channel or chat to publish to (@channel or numeric id); /settarget overrides it
TARGET_CHAT_ID=

# bot | dashboard | collector
APP_MODE=bot
DASHBOARD_PORT=8080

# IANA timezone for slot times
TIMEZONE=UTC
POST_TIMES={post_times}
MAX_POSTS_PER_DAY=6

# Comma separated; each entry is URL or Name|URL. Empty uses the built-in list.
RSS_FEEDS=

# Language of generated posts
LANG=ru

DB_PATH=bot.db

OLLAMA_BASE_URL=http://localhost:11434
OLLAMA_MODEL=llama3.1:8b
OPENAI_API_KEY=
OPENAI_BASE_URL=https://api.openai.com
OPENAI_MODEL=gpt-4o-mini
LLM_TIMEOUT_SECONDS=15
PREFER_OLLAMA=true
ENABLE_REVIEW=false

# Extra attempts after a transient Telegram failure
CHAT_SEND_RETRIES=2
"#,
            post_times = DEFAULT_POST_TIMES
        )
    }
}

impl RawConfig {
    pub fn normalize(self) -> Result<AppConfig> {
        let token = non_empty(self.telegram_bot_token)
            .context("TELEGRAM_BOT_TOKEN is required")?;

        let timezone = match non_empty(self.timezone) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("Invalid TIMEZONE '{}': {}", name, e))?,
            None => chrono_tz::UTC,
        };

        let app_mode = match non_empty(self.app_mode) {
            Some(mode) => mode.parse()?,
            None => AppMode::default(),
        };

        let dashboard_port = match non_empty(self.dashboard_port) {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid DASHBOARD_PORT '{}'", port))?,
            None => 8080,
        };

        Ok(AppConfig {
            telegram_bot_token: SecretString::new(token.into()),
            target_chat_id: non_empty(self.target_chat_id),
            app_mode,
            dashboard_port,
            timezone,
            post_times: normalize_post_times(self.post_times.as_deref()),
            max_posts_per_day: normalize_max_posts(self.max_posts_per_day.as_deref()),
            feeds: normalize_feeds(self.rss_feeds.as_deref()),
            lang: normalize_lang(self.lang.as_deref()),
            db_path: PathBuf::from(non_empty(self.db_path).unwrap_or_else(|| "bot.db".to_string())),
            ollama_base_url: non_empty(self.ollama_base_url)
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: non_empty(self.ollama_model).unwrap_or_else(|| "llama3.1:8b".to_string()),
            openai_api_key: non_empty(self.openai_api_key).map(|k| SecretString::new(k.into())),
            openai_base_url: non_empty(self.openai_base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            openai_model: non_empty(self.openai_model).unwrap_or_else(|| "gpt-4o-mini".to_string()),
            llm_timeout: Duration::from_secs(
                non_empty(self.llm_timeout_seconds)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(15)
                    .max(1),
            ),
            prefer_ollama: self.prefer_ollama.as_deref().map(boolish).unwrap_or(true),
            enable_review: self.enable_review.as_deref().map(boolish).unwrap_or(false),
            chat_send_retries: non_empty(self.chat_send_retries)
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_csv(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect()
}

/// `1/true/yes/on`, case insensitive
pub fn boolish(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn normalize_post_times(value: Option<&str>) -> Vec<SlotTime> {
    let raw = value.unwrap_or(DEFAULT_POST_TIMES);
    let mut times = parse_post_times(&split_csv(raw));
    times.truncate(MAX_SLOTS_PER_DAY);
    if times.is_empty() {
        times.extend(SlotTime::new(9, 0));
    }
    times
}

pub fn normalize_max_posts(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(MAX_SLOTS_PER_DAY as i64)
        .clamp(1, MAX_SLOTS_PER_DAY as i64) as usize
}

pub fn normalize_feeds(value: Option<&str>) -> Vec<FeedSpec> {
    let feeds: Vec<FeedSpec> = value
        .map(split_csv)
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry.split_once('|') {
            Some((name, url)) if !name.trim().is_empty() => FeedSpec::named(name.trim(), url.trim()),
            Some((_, url)) => FeedSpec::new(url.trim()),
            None => FeedSpec::new(entry),
        })
        .filter(|feed| !feed.url.is_empty())
        .collect();

    if feeds.is_empty() {
        DEFAULT_FEEDS
            .iter()
            .map(|(name, url)| FeedSpec::named(*name, *url))
            .collect()
    } else {
        feeds
    }
}

/// Reduce a POSIX locale such as `en_US.UTF-8` to `en`
pub fn normalize_lang(value: Option<&str>) -> String {
    let lang = value
        .unwrap_or("")
        .trim()
        .split(['_', '.', '-', '@'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    match lang.as_str() {
        "" | "c" | "posix" => "ru".to_string(),
        _ => lang,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_token() -> RawConfig {
        RawConfig {
            telegram_bot_token: Some("123:abc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = RawConfig::default().normalize().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));

        let blank = RawConfig {
            telegram_bot_token: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.normalize().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = raw_with_token().normalize().unwrap();

        assert_eq!(config.app_mode, AppMode::Bot);
        assert_eq!(config.timezone, chrono_tz::UTC);
        assert_eq!(config.post_times.len(), 6);
        assert_eq!(config.max_posts_per_day, 6);
        assert_eq!(config.feeds.len(), DEFAULT_FEEDS.len());
        assert_eq!(config.feeds[0].name.as_deref(), Some("OpenAI"));
        assert_eq!(config.lang, "ru");
        assert_eq!(config.db_path, PathBuf::from("bot.db"));
        assert_eq!(config.ollama_base_url, "http://localhost:11434");
        assert_eq!(config.openai_base_url, "https://api.openai.com");
        assert_eq!(config.llm_timeout, Duration::from_secs(15));
        assert!(config.prefer_ollama);
        assert!(!config.enable_review);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.chat_send_retries, 2);
    }

    #[test]
    fn test_post_times_normalization() {
        let times: Vec<String> = normalize_post_times(Some("9:00, 25:00, 12:5, x, 18:30"))
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(times, vec!["09:00", "12:05", "18:30"]);

        let fallback: Vec<String> = normalize_post_times(Some("nope"))
            .iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(fallback, vec!["09:00"]);

        assert_eq!(
            normalize_post_times(Some("1:00,2:00,3:00,4:00,5:00,6:00,7:00")).len(),
            6
        );
    }

    #[test]
    fn test_max_posts_clamped() {
        assert_eq!(normalize_max_posts(Some("0")), 1);
        assert_eq!(normalize_max_posts(Some("42")), 6);
        assert_eq!(normalize_max_posts(Some("three")), 6);
        assert_eq!(normalize_max_posts(Some(" 3 ")), 3);
        assert_eq!(normalize_max_posts(None), 6);
    }

    #[test]
    fn test_feeds_with_names() {
        let feeds = normalize_feeds(Some("Lab|https://lab.test/rss, https://plain.test/feed,"));
        assert_eq!(
            feeds,
            vec![
                FeedSpec::named("Lab", "https://lab.test/rss"),
                FeedSpec::new("https://plain.test/feed"),
            ]
        );
        assert_eq!(normalize_feeds(Some(" , ")).len(), DEFAULT_FEEDS.len());
    }

    #[test]
    fn test_lang_and_boolish() {
        assert_eq!(normalize_lang(Some("en_US.UTF-8")), "en");
        assert_eq!(normalize_lang(Some("RU")), "ru");
        assert_eq!(normalize_lang(Some("C.UTF-8")), "ru");
        assert_eq!(normalize_lang(None), "ru");

        assert!(boolish("YES"));
        assert!(boolish(" on "));
        assert!(boolish("1"));
        assert!(!boolish("0"));
        assert!(!boolish("enabled"));
    }

    #[test]
    fn test_invalid_timezone_and_mode() {
        let tz = RawConfig {
            timezone: Some("Mars/Olympus".to_string()),
            ..raw_with_token()
        };
        assert!(tz.normalize().unwrap_err().to_string().contains("TIMEZONE"));

        let mode = RawConfig {
            app_mode: Some("worker".to_string()),
            ..raw_with_token()
        };
        assert!(mode.normalize().is_err());

        let ok = RawConfig {
            timezone: Some("Europe/Moscow".to_string()),
            app_mode: Some("Dashboard".to_string()),
            llm_timeout_seconds: Some("0".to_string()),
            ..raw_with_token()
        }
        .normalize()
        .unwrap();
        assert_eq!(ok.timezone, chrono_tz::Europe::Moscow);
        assert_eq!(ok.app_mode, AppMode::Dashboard);
        assert_eq!(ok.llm_timeout, Duration::from_secs(1));
    }
}
