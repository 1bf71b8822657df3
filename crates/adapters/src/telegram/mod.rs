//! Telegram Bot API adapter

mod client;
mod stub;
pub mod types;

pub use client::{DEFAULT_TELEGRAM_URL, TelegramBot};
pub use stub::StubChatSender;
pub use types::{Chat, Message, Update, User};
