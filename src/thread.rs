//! Reply-chain thread tracking.
//!
//! Every inbound message is assigned to a conversation thread: a fresh
//! `channel-message` id when it starts a chain, or the parent's thread id
//! when it replies to a known message. The message-id map survives trims so
//! membership stays transitive along chains of any length.

use crate::persist::PersistenceLayer;
use crate::scope::ScopeKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const DEFAULT_THREAD_MESSAGE_LIMIT: usize = 10;

const SNAPSHOT_NAMESPACE: &str = "conversations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One immutable turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment_refs: Vec<String>,
}

pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

impl ChatMessage {
    /// Display names are capped and stripped of control characters before
    /// they enter a thread.
    pub fn sanitize_display_name(raw: &str) -> String {
        raw.chars()
            .filter(|c| !c.is_control())
            .take(MAX_DISPLAY_NAME_CHARS)
            .collect()
    }
}

/// A single root plus its reply chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationThread {
    pub messages: HashMap<String, ChatMessage>,
}

/// One scope's thread state. `thread_ids` maps every message ever recorded
/// to its thread and is never pruned; `threads` holds the live message
/// bodies and is cleared wholesale when a thread is archived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeThreads {
    threads: HashMap<String, ConversationThread>,
    thread_ids: HashMap<String, String>,
}

pub struct ThreadResolver {
    scopes: Mutex<HashMap<ScopeKey, ScopeThreads>>,
    persist: Arc<PersistenceLayer>,
    thread_message_limit: usize,
}

impl ThreadResolver {
    pub fn new(persist: Arc<PersistenceLayer>, thread_message_limit: usize) -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
            persist,
            thread_message_limit: thread_message_limit.max(2),
        }
    }

    /// Load the scope's snapshot from disk on first touch. An absent
    /// snapshot simply means the scope is new.
    pub async fn ensure_scope(&self, scope: &ScopeKey) {
        if self.scopes.lock().unwrap().contains_key(scope) {
            return;
        }

        let loaded: ScopeThreads = self
            .persist
            .load(SNAPSHOT_NAMESPACE, scope.as_str(), ScopeThreads::default())
            .await;

        self.scopes
            .lock()
            .unwrap()
            .entry(scope.clone())
            .or_insert(loaded);
    }

    /// Thread id for an inbound message: inherited from a known reply
    /// target, otherwise minted as `channel-message`. An orphan reply (the
    /// target was never seen here) starts its own isolated thread.
    pub fn resolve_thread_id(&self, scope: &ScopeKey, channel_id: &str, message: &ChatMessage) -> String {
        let mut scopes = self.scopes.lock().unwrap();
        let state = scopes.entry(scope.clone()).or_default();

        message
            .reply_to_id
            .as_deref()
            .and_then(|parent| state.thread_ids.get(parent))
            .cloned()
            .unwrap_or_else(|| format!("{}-{}", channel_id, message.id))
    }

    /// Insert a message into its thread. When the insert pushes the thread
    /// to the message-count limit the thread is archived: its bodies are
    /// returned (oldest first) for the caller to summarize, the thread id
    /// and the id-map entries stay behind.
    pub fn record(
        &self,
        scope: &ScopeKey,
        thread_id: &str,
        message: ChatMessage,
    ) -> Option<Vec<ChatMessage>> {
        let mut scopes = self.scopes.lock().unwrap();
        let state = scopes.entry(scope.clone()).or_default();

        state
            .thread_ids
            .insert(message.id.clone(), thread_id.to_string());

        let thread = state.threads.entry(thread_id.to_string()).or_default();
        thread.messages.insert(message.id.clone(), message);

        if thread.messages.len() < self.thread_message_limit {
            return None;
        }

        let mut evicted: Vec<ChatMessage> = thread.messages.drain().map(|(_, m)| m).collect();
        evicted.sort_by(|a, b| match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.id.cmp(&b.id),
        });
        Some(evicted)
    }

    /// Clone of the thread's current state, if it has any live messages.
    pub fn thread(&self, scope: &ScopeKey, thread_id: &str) -> Option<ConversationThread> {
        let scopes = self.scopes.lock().unwrap();
        scopes
            .get(scope)
            .and_then(|state| state.threads.get(thread_id))
            .filter(|thread| !thread.messages.is_empty())
            .cloned()
    }

    /// Write the scope's snapshot. Failures are logged and swallowed; the
    /// in-memory state remains authoritative until the next attempt.
    pub async fn persist_scope(&self, scope: &ScopeKey) {
        let snapshot = {
            let scopes = self.scopes.lock().unwrap();
            match scopes.get(scope) {
                Some(state) => state.clone(),
                None => return,
            }
        };

        if let Err(e) = self
            .persist
            .save(SNAPSHOT_NAMESPACE, scope.as_str(), &snapshot)
            .await
        {
            warn!("Conversation snapshot for scope {} failed: {}", scope, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(limit: usize) -> (tempfile::TempDir, ThreadResolver) {
        let dir = tempfile::tempdir().unwrap();
        let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
        (dir, ThreadResolver::new(persist, limit))
    }

    fn message(id: &str, reply_to: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            role: Role::User,
            display_name: "Alice".to_string(),
            author_id: Some("1".to_string()),
            content: format!("message {}", id),
            reply_to_id: reply_to.map(str::to_string),
            attachment_refs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn root_message_mints_channel_message_id() {
        let (_dir, resolver) = resolver(10);
        let scope = ScopeKey::new("g1");

        let root = message("100", None);
        assert_eq!(resolver.resolve_thread_id(&scope, "chan1", &root), "chan1-100");
    }

    #[tokio::test]
    async fn replies_inherit_the_root_thread() {
        let (_dir, resolver) = resolver(10);
        let scope = ScopeKey::new("g1");

        let root = message("100", None);
        let tid = resolver.resolve_thread_id(&scope, "chan1", &root);
        resolver.record(&scope, &tid, root);

        let mut parent = "100".to_string();
        for id in 101..=105 {
            let reply = message(&id.to_string(), Some(&parent));
            let reply_tid = resolver.resolve_thread_id(&scope, "chan1", &reply);
            assert_eq!(reply_tid, "chan1-100");
            resolver.record(&scope, &reply_tid, reply);
            parent = id.to_string();
        }
    }

    #[tokio::test]
    async fn unrelated_message_starts_a_new_thread() {
        let (_dir, resolver) = resolver(10);
        let scope = ScopeKey::new("g1");

        let a = message("A", None);
        let tid_a = resolver.resolve_thread_id(&scope, "chan1", &a);
        resolver.record(&scope, &tid_a, a);

        let b = message("B", Some("A"));
        assert_eq!(resolver.resolve_thread_id(&scope, "chan1", &b), "chan1-A");
        resolver.record(&scope, "chan1-A", b);

        let c = message("C", None);
        assert_eq!(resolver.resolve_thread_id(&scope, "chan1", &c), "chan1-C");
    }

    #[tokio::test]
    async fn orphan_reply_becomes_isolated_thread() {
        let (_dir, resolver) = resolver(10);
        let scope = ScopeKey::new("g1");

        let orphan = message("200", Some("never-seen"));
        assert_eq!(
            resolver.resolve_thread_id(&scope, "chan1", &orphan),
            "chan1-200"
        );
    }

    #[tokio::test]
    async fn archive_clears_bodies_but_keeps_inheritance() {
        let (_dir, resolver) = resolver(3);
        let scope = ScopeKey::new("g1");

        let root = message("100", None);
        let tid = resolver.resolve_thread_id(&scope, "chan1", &root);
        assert!(resolver.record(&scope, &tid, root).is_none());
        assert!(resolver
            .record(&scope, &tid, message("101", Some("100")))
            .is_none());

        let evicted = resolver
            .record(&scope, &tid, message("102", Some("101")))
            .expect("third insert should archive");
        assert_eq!(evicted.len(), 3);
        assert_eq!(evicted[0].id, "100");
        assert_eq!(evicted[2].id, "102");

        // Bodies are gone but the chain still resolves to the old thread.
        assert!(resolver.thread(&scope, &tid).is_none());
        let late_reply = message("103", Some("102"));
        assert_eq!(resolver.resolve_thread_id(&scope, "chan1", &late_reply), tid);
    }

    #[tokio::test]
    async fn scopes_are_disjoint() {
        let (_dir, resolver) = resolver(10);
        let scope_a = ScopeKey::new("g1");
        let scope_b = ScopeKey::new("g2");

        let root = message("100", None);
        let tid = resolver.resolve_thread_id(&scope_a, "chan1", &root);
        resolver.record(&scope_a, &tid, root);

        // The other scope has never seen message 100.
        let reply = message("101", Some("100"));
        assert_eq!(
            resolver.resolve_thread_id(&scope_b, "chan1", &reply),
            "chan1-101"
        );
    }

    #[tokio::test]
    async fn snapshot_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let scope = ScopeKey::new("g1");

        {
            let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
            let resolver = ThreadResolver::new(persist, 10);
            let root = message("100", None);
            let tid = resolver.resolve_thread_id(&scope, "chan1", &root);
            resolver.record(&scope, &tid, root);
            resolver.persist_scope(&scope).await;
        }

        let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
        let resolver = ThreadResolver::new(persist, 10);
        resolver.ensure_scope(&scope).await;

        let reply = message("101", Some("100"));
        assert_eq!(
            resolver.resolve_thread_id(&scope, "chan1", &reply),
            "chan1-100"
        );
        let thread = resolver.thread(&scope, "chan1-100").unwrap();
        assert_eq!(thread.messages.len(), 1);
    }
}
