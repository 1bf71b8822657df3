//! Rendering use case - transforms post text into chat-ready HTML

use crate::text::truncate_chars;

/// Telegram's message length limit, in characters of visible text
pub const TELEGRAM_MAX_CHARS: usize = 4096;

/// Configuration for the renderer
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Maximum characters of visible text per message
    pub max_chars: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_chars: TELEGRAM_MAX_CHARS,
        }
    }
}

/// Renderer for HTML parse mode
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Cut to the message limit, then escape for HTML parse mode
    ///
    /// The limit applies to the visible text, so entities added by escaping
    /// do not count against it.
    pub fn render_html(&self, text: &str) -> String {
        let visible = truncate_chars(text.trim(), self.config.max_chars);
        html_escape::encode_text(&visible).into_owned()
    }
}
