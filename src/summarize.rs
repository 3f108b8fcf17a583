//! Archived-thread summarization.
//!
//! When a thread hits its message-count limit the evicted turns are
//! condensed into one recollection on the scope's shelf, so the context
//! survives the trim in compressed form.

use crate::llm::LlmClient;
use crate::memory::{MemoryKind, MemoryStore};
use crate::scope::ScopeKey;
use crate::thread::ChatMessage;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ThreadSummarizer {
    llm: Arc<LlmClient>,
    memory: Arc<MemoryStore>,
}

impl ThreadSummarizer {
    pub fn new(llm: Arc<LlmClient>, memory: Arc<MemoryStore>) -> Self {
        Self { llm, memory }
    }

    /// Summarize evicted turns into the scope's memory. A failed summary is
    /// logged and dropped; it must never block the in-progress reply.
    pub async fn archive(&self, scope: &ScopeKey, evicted: &[ChatMessage]) {
        if evicted.is_empty() {
            return;
        }

        let mut transcript = String::new();
        for turn in evicted {
            transcript.push_str(&format!("{}: {}\n", turn.display_name, turn.content));
        }

        let prompt = format!(
            "Condense the following conversation into one or two sentences capturing who said \
             what and any decisions or facts worth remembering. Reply with only the summary.\n\n{}",
            transcript
        );

        match self.llm.completion(&prompt).await {
            Ok(summary) if !summary.trim().is_empty() => {
                info!("Archived {} turns into memory for scope {}", evicted.len(), scope);
                self.memory
                    .append(MemoryKind::Clone, scope.as_str(), summary.trim())
                    .await;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Thread summarization failed for scope {}: {}", scope, e);
            }
        }
    }
}
