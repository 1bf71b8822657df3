//! newsroom adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: SQLite and in-memory stores
//! - `feed_http`: RSS/Atom feed source
//! - `llm`: Ollama and OpenAI-compatible backends
//! - `telegram`: Bot API client
//! - `dashboard`: HTTP dashboard

pub mod dashboard;
pub mod feed_http;
pub mod llm;
mod store_memory;
mod store_sqlite;
pub mod telegram;

/// Re-exports for store adapters
pub mod store {
    pub use crate::store_memory::InMemoryStore;
    pub use crate::store_sqlite::SqliteStore;
}
