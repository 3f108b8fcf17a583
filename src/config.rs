use crate::history::DEFAULT_SNIPPET_LINES;
use crate::memory::DEFAULT_MEMORY_BUDGET;
use crate::scope::ScopeMode;
use crate::thread::DEFAULT_THREAD_MESSAGE_LIMIT;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    /// Source of the at-rest encryption key for every persisted blob.
    pub memory_secret: String,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub data_dir: String,
    pub persona: String,
    pub agent_name: String,
    pub status_message: String,
    pub scope_mode: ScopeMode,
    pub memory_budget: usize,
    pub thread_message_limit: usize,
    pub history_snippet_lines: usize,
    pub interjection_debounce_secs: u64,
    pub tenor_api_key: Option<String>,
}

const DEFAULT_PERSONA: &str = "You are Mimic, a friendly regular in this server. You talk like \
one more member of the conversation: casual, concise, and genuinely helpful when asked. You \
remember what people tell you and you never pretend to be anyone else.";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            memory_secret: env::var("MEMORY_SECRET")
                .map_err(|_| anyhow::anyhow!("MEMORY_SECRET must be set"))?,
            llm_url: env::var("LLM_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1".to_string()),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| "local-model".to_string()),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            persona: env::var("PERSONA").unwrap_or_else(|_| DEFAULT_PERSONA.to_string()),
            agent_name: env::var("AGENT_NAME").unwrap_or_else(|_| "Mimic".to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "hanging out".to_string()),
            scope_mode: ScopeMode::parse(
                &env::var("SCOPE_MODE").unwrap_or_else(|_| "guild".to_string()),
            )?,
            memory_budget: env::var("MEMORY_BUDGET")
                .unwrap_or_else(|_| DEFAULT_MEMORY_BUDGET.to_string())
                .parse()
                .unwrap_or(DEFAULT_MEMORY_BUDGET),
            thread_message_limit: env::var("THREAD_MESSAGE_LIMIT")
                .unwrap_or_else(|_| DEFAULT_THREAD_MESSAGE_LIMIT.to_string())
                .parse()
                .unwrap_or(DEFAULT_THREAD_MESSAGE_LIMIT),
            history_snippet_lines: env::var("HISTORY_SNIPPET_LINES")
                .unwrap_or_else(|_| DEFAULT_SNIPPET_LINES.to_string())
                .parse()
                .unwrap_or(DEFAULT_SNIPPET_LINES),
            interjection_debounce_secs: env::var("INTERJECTION_DEBOUNCE_SECS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            tenor_api_key: env::var("TENOR_API_KEY").ok(),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            discord_token: "test".to_string(),
            memory_secret: "test-secret".to_string(),
            llm_url: "http://localhost:8080/v1".to_string(),
            llm_model: "test-model".to_string(),
            llm_api_key: None,
            data_dir: "data".to_string(),
            persona: "test persona".to_string(),
            agent_name: "Mimic".to_string(),
            status_message: "testing".to_string(),
            scope_mode: ScopeMode::Guild,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            thread_message_limit: DEFAULT_THREAD_MESSAGE_LIMIT,
            history_snippet_lines: DEFAULT_SNIPPET_LINES,
            interjection_debounce_secs: 3,
            tenor_api_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("memory_secret", &"[REDACTED]")
            .field("llm_url", &self.llm_url)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("data_dir", &self.data_dir)
            .field("persona", &self.persona)
            .field("agent_name", &self.agent_name)
            .field("status_message", &self.status_message)
            .field("scope_mode", &self.scope_mode)
            .field("memory_budget", &self.memory_budget)
            .field("thread_message_limit", &self.thread_message_limit)
            .field("history_snippet_lines", &self.history_snippet_lines)
            .field(
                "interjection_debounce_secs",
                &self.interjection_debounce_secs,
            )
            .field(
                "tenor_api_key",
                &self.tenor_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
