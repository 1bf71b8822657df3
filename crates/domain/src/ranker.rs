//! Pure scoring and topic bucketing of candidate items

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keywords::keyword_hits;

/// Upper bound of [`score`]
pub const MAX_SCORE: i64 = 200;

/// Topical category derived from item text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Tools,
    Agents,
    Releases,
    Research,
    Safety,
    General,
}

impl Bucket {
    /// Preferred bucket per slot position
    pub const SLOT_PREFERENCE: [Bucket; 6] = [
        Bucket::Agents,
        Bucket::Tools,
        Bucket::Releases,
        Bucket::Research,
        Bucket::Safety,
        Bucket::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Tools => "tools",
            Bucket::Agents => "agents",
            Bucket::Releases => "releases",
            Bucket::Research => "research",
            Bucket::Safety => "safety",
            Bucket::General => "general",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BOOSTERS: &[(&str, i64)] = &[
    ("agent", 6),
    ("multi-agent", 6),
    ("mcp", 6),
    ("function calling", 4),
    ("tool", 3),
    ("release", 3),
    ("launch", 3),
    ("paper", 3),
    ("arxiv", 3),
    ("benchmark", 3),
    ("security", 2),
    ("openai", 2),
    ("anthropic", 2),
    ("gemini", 2),
    ("deepmind", 2),
];

const SOURCE_WEIGHTS: &[(&str, i64)] = &[
    ("openai", 4),
    ("deepmind", 3),
    ("google ai", 3),
    ("hugging face", 3),
    ("anthropic", 3),
];

// First matching rule wins.
const BUCKET_RULES: &[(Bucket, &[&str])] = &[
    (Bucket::Tools, &["mcp", "tool", "function calling", "sdk"]),
    (Bucket::Agents, &["agent", "multi-agent", "агент"]),
    (Bucket::Releases, &["release", "launch", "update"]),
    (Bucket::Research, &["paper", "arxiv", "benchmark"]),
    (Bucket::Safety, &["security", "safety", "alignment"]),
];

/// Relevance score in `[0, MAX_SCORE]`
pub fn score(title: &str, summary: &str, source: &str) -> i64 {
    let text = format!("{} {}", title, summary).to_lowercase();

    let mut total = 2 * keyword_hits(&text) as i64;
    total += BOOSTERS
        .iter()
        .filter(|(term, _)| text.contains(term))
        .map(|(_, weight)| weight)
        .sum::<i64>();

    let source = source.to_lowercase();
    total += SOURCE_WEIGHTS
        .iter()
        .find(|(name, _)| source.contains(name))
        .map(|(_, weight)| *weight)
        .unwrap_or(0);

    total.clamp(0, MAX_SCORE)
}

pub fn bucket(title: &str, summary: &str) -> Bucket {
    let text = format!("{} {}", title, summary).to_lowercase();
    BUCKET_RULES
        .iter()
        .find(|(_, terms)| terms.iter().any(|term| text.contains(term)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(Bucket::General)
}
