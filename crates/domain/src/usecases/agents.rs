//! Editorial agents built on the LLM client
//!
//! The orchestrator is pure. Writer, critic and reviser each own a prompt and
//! degrade to deterministic output when no backend answers.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{Item, PlannedPost, PostFormat};
use crate::slots::SlotTime;
use crate::text::{clamp_title, compact_text};
use crate::usecases::llm_client::{Generated, LlmClient};

/// Longest alternative headline
pub const ALT_TITLE_MAX_CHARS: usize = 90;
/// Summary length passed into prompts
pub const PROMPT_SUMMARY_CHARS: usize = 1800;
/// Summary length used by the canned fallback post
pub const FALLBACK_SUMMARY_CHARS: usize = 600;

/// Assigns editorial formats to slots
#[derive(Debug, Clone, Copy, Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Round-robin over [`PostFormat::ROTATION`] in slot order
    pub fn pick_formats(&self, slots: &[SlotTime]) -> BTreeMap<SlotTime, PostFormat> {
        slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (*slot, PostFormat::ROTATION[idx % PostFormat::ROTATION.len()]))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct WriterReply {
    #[serde(default)]
    alt_title_1: Option<serde_json::Value>,
    #[serde(default)]
    alt_title_2: Option<serde_json::Value>,
    #[serde(default)]
    post: Option<serde_json::Value>,
}

fn value_text(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Parse the substring between the first `{` and the last `}`
fn extract_json_object(raw: &str) -> Option<WriterReply> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn style_hint(format: PostFormat) -> &'static str {
    match format {
        PostFormat::BreakingNews => "Breaking news: briefly say what happened and why it matters.",
        PostFormat::ToolOfTheDay => "Focus on one practical tool or feature and how to apply it.",
        PostFormat::ExplainLike5 => "Explain in plain words without losing the meaning.",
        PostFormat::OpinionatedTake => "Give a careful opinion with arguments and risks.",
        PostFormat::UseCase => "Describe a use case: problem, solution, result.",
        PostFormat::DailyDigest => "A compact digest of this one story with conclusions.",
    }
}

fn source_label(lang: &str) -> &'static str {
    if lang.eq_ignore_ascii_case("ru") {
        "Источник"
    } else {
        "Source"
    }
}

/// Deterministic post used when no backend produced text
pub fn fallback_post(item: &Item, lang: &str) -> String {
    let mut post = format!(
        "📰 {}\n\n{}\n\n{}: {}",
        item.title.trim(),
        compact_text(&item.summary, FALLBACK_SUMMARY_CHARS),
        source_label(lang),
        item.source
    );
    if !item.link.is_empty() {
        post.push('\n');
        post.push_str(&item.link);
    }
    post.push_str("\n#AI #LLM");
    post
}

/// Drafts the post for one item in a given format
pub struct Writer {
    llm: Arc<LlmClient>,
    lang: String,
}

impl Writer {
    pub fn new(llm: Arc<LlmClient>, lang: impl Into<String>) -> Self {
        Self {
            llm,
            lang: lang.into(),
        }
    }

    pub async fn write(&self, item: &Item, format: PostFormat) -> PlannedPost {
        let system = "You are the editor of a Telegram channel about AI, LLMs and AI agents. \
                      Write clearly and briefly, with no filler.";
        let user = format!(
            "Input:\n- Source: {}\n- Title: {}\n- Link: {}\n- Summary:\n{}\n\n\
             Write the post in language: {}.\nStyle: {}\n\n\
             Return strictly JSON:\n{{\n  \"alt_title_1\": \"...\",\n  \"alt_title_2\": \"...\",\n  \"post\": \"...\"\n}}\n\n\
             Rules:\n- post at most 900 characters\n\
             - one headline line, then 3-6 bullets, then one takeaway, then the link, then 2-5 hashtags\n\
             - do not invent facts; if data is thin, say so",
            item.source,
            item.title,
            item.link,
            compact_text(&item.summary, PROMPT_SUMMARY_CHARS),
            self.lang,
            style_hint(format),
        );

        let title = clamp_title(&item.title, ALT_TITLE_MAX_CHARS);
        let raw = self.llm.generate(system, &user).await.into_option();

        let Some(reply) = raw.as_deref().and_then(extract_json_object) else {
            tracing::debug!(guid = %item.guid, "Writer reply was not JSON, using rewrite");
            return PlannedPost {
                guid: item.guid.clone(),
                format,
                alt_title_1: title.clone(),
                alt_title_2: title,
                post_text: self.rewrite(item).await,
            };
        };

        let alt_title_1 = Some(clamp_title(&value_text(reply.alt_title_1), ALT_TITLE_MAX_CHARS))
            .filter(|t| !t.is_empty())
            .unwrap_or(title);
        let alt_title_2 = Some(clamp_title(&value_text(reply.alt_title_2), ALT_TITLE_MAX_CHARS))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| alt_title_1.clone());

        let mut post_text = value_text(reply.post).trim().to_string();
        if post_text.is_empty() {
            post_text = self.rewrite(item).await;
        }

        PlannedPost {
            guid: item.guid.clone(),
            format,
            alt_title_1,
            alt_title_2,
            post_text,
        }
    }

    /// Freeform rewrite, or the canned post when no backend answers
    pub async fn rewrite(&self, item: &Item) -> String {
        let system = format!(
            "You are the editor of a Telegram channel about AI, LLMs and agents. \
             Rewrite the news item as a short post in language: {}. \
             Format: 2-4 short paragraphs plus 3-5 hashtags at the end. \
             Do not invent facts or add anything missing from the text.",
            self.lang
        );
        let user = format!(
            "Title: {}\nSource: {}\nLink: {}\nText: {}",
            item.title,
            item.source,
            item.link,
            compact_text(&item.summary, PROMPT_SUMMARY_CHARS)
        );

        match self.llm.generate(&system, &user).await {
            Generated::Text(text) => text,
            Generated::Empty => {
                tracing::info!(guid = %item.guid, "No LLM available, using fallback post");
                fallback_post(item, &self.lang)
            }
        }
    }
}

/// Produces a critique of a drafted post
pub struct Critic {
    llm: Arc<LlmClient>,
    lang: String,
}

impl Critic {
    pub fn new(llm: Arc<LlmClient>, lang: impl Into<String>) -> Self {
        Self {
            llm,
            lang: lang.into(),
        }
    }

    /// Critique text, or empty when no backend answered
    pub async fn review(&self, post_text: &str) -> String {
        let system = "You are a strict editor reviewing Telegram posts.";
        let user = format!(
            "Review the post (language: {}).\n\nPost:\n{}\n\n\
             Return 5-10 points:\n- factual risks or hallucinations\n\
             - anything unclear or too long\n- what to improve on the first screen",
            self.lang, post_text
        );
        self.llm
            .generate(system, &user)
            .await
            .into_option()
            .unwrap_or_default()
    }
}

/// Applies a critique to a drafted post
pub struct Reviser {
    llm: Arc<LlmClient>,
    lang: String,
}

impl Reviser {
    pub fn new(llm: Arc<LlmClient>, lang: impl Into<String>) -> Self {
        Self {
            llm,
            lang: lang.into(),
        }
    }

    /// Improved post, or the original on any failure
    pub async fn revise(&self, post_text: &str, critique: &str) -> String {
        if critique.trim().is_empty() {
            return post_text.to_string();
        }
        let system = "You are an editor. Improve the post according to the critic's notes.";
        let user = format!(
            "Language: {}\n\nOriginal post:\n{}\n\nCritic's notes:\n{}\n\n\
             Write the improved version. Constraints:\n- at most 900 characters\n\
             - headline, 3-6 bullets, takeaway, link, 2-5 hashtags\n\
             - do not add facts that were not there",
            self.lang, post_text, critique
        );
        self.llm
            .generate(system, &user)
            .await
            .into_option()
            .unwrap_or_else(|| post_text.to_string())
    }
}
