pub mod commands;
pub mod config;
pub mod extract;
pub mod handler;
pub mod history;
pub mod llm;
pub mod memory;
pub mod persist;
pub mod prompt;
pub mod rate;
pub mod scope;
pub mod session;
pub mod settings;
pub mod summarize;
pub mod thread;
pub mod timer;

use std::sync::Arc;

/// Shared state handed to all commands and event handlers. Cheap to clone;
/// every field is behind an Arc so deferred interjections can own a copy.
#[derive(Clone)]
pub struct Data {
    pub config: Arc<config::Config>,
    pub llm: Arc<llm::LlmClient>,
    pub memory: Arc<memory::MemoryStore>,
    pub settings: Arc<settings::SettingsStore>,
    pub session: Arc<session::SessionStore>,
    pub extractor: Arc<extract::ContentExtractor>,
    pub summarizer: Arc<summarize::ThreadSummarizer>,
    /// The agent's own user ID, for mention and self-reply detection.
    pub bot_id: u64,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
