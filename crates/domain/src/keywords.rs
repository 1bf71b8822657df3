//! Topic keyword set used to admit feed entries and to score them

/// Lowercase keywords; an entry must contain at least one to be ingested
pub const KEYWORDS: &[&str] = &[
    "agent",
    "agents",
    "multi-agent",
    "llm",
    "gpt",
    "openai",
    "anthropic",
    "claude",
    "gemini",
    "deepmind",
    "hugging face",
    "ollama",
    "mcp",
    "tool",
    "function calling",
    "reasoning",
    "ai",
    "artificial intelligence",
    "искусственный интеллект",
    "агент",
    "агенты",
];

/// Number of distinct keywords contained in already-lowercased text
pub fn keyword_hits(lowered: &str) -> usize {
    KEYWORDS.iter().filter(|k| lowered.contains(*k)).count()
}

/// Case-insensitive check for any keyword
pub fn matches_keywords(text: &str) -> bool {
    let lowered = text.to_lowercase();
    KEYWORDS.iter().any(|k| lowered.contains(k))
}
