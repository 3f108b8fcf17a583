//! Shared per-session state.
//!
//! All the shared mutable maps (thread histories, cooldown timers, recent
//! channel lines) live behind this one aggregate, constructed once at
//! startup and passed by reference to handlers.

use crate::config::Config;
use crate::history::ChannelHistory;
use crate::persist::PersistenceLayer;
use crate::rate::RateGate;
use crate::thread::ThreadResolver;
use std::sync::Arc;

pub struct SessionStore {
    pub resolver: ThreadResolver,
    pub gate: RateGate,
    pub history: ChannelHistory,
}

impl SessionStore {
    pub fn new(persist: Arc<PersistenceLayer>, config: &Config) -> Self {
        Self {
            resolver: ThreadResolver::new(persist, config.thread_message_limit),
            gate: RateGate::new(),
            history: ChannelHistory::new(256, config.history_snippet_lines),
        }
    }
}
