//! Long-term recollection per identity.
//!
//! Entries are append-only and oldest-first. Every write re-applies the
//! character budget by dropping entries from the oldest end, so readers
//! always see an already-trimmed list. Reads never trim.

use crate::persist::PersistenceLayer;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub const DEFAULT_MEMORY_BUDGET: usize = 1000;

/// Which shelf an identity's recollections live on: facts about a user, or
/// the agent's own recollection of a scope's conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    User,
    Clone,
}

impl MemoryKind {
    fn namespace(self) -> &'static str {
        match self {
            Self::User => "memory/user",
            Self::Clone => "memory/clone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    pub content: String,
}

pub struct MemoryStore {
    persist: Arc<PersistenceLayer>,
    budget: usize,
    cache: Mutex<HashMap<String, Vec<MemoryEntry>>>,
}

impl MemoryStore {
    pub fn new(persist: Arc<PersistenceLayer>, budget: usize) -> Self {
        Self {
            persist,
            budget,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(kind: MemoryKind, identity: &str) -> String {
        format!("{}/{}", kind.namespace(), identity)
    }

    /// Append one recollection, trim to budget, persist. A failed disk
    /// write is logged and swallowed; the cache keeps the update so the
    /// next successful write carries it.
    pub async fn append(&self, kind: MemoryKind, identity: &str, content: &str) {
        let key = Self::cache_key(kind, identity);
        let mut cache = self.cache.lock().await;

        if !cache.contains_key(&key) {
            let loaded = self
                .persist
                .load(kind.namespace(), identity, Vec::new())
                .await;
            cache.insert(key.clone(), loaded);
        }

        let entries = cache.entry(key.clone()).or_default();
        entries.push(MemoryEntry {
            timestamp: Utc::now().timestamp_millis(),
            content: content.to_string(),
        });
        trim_to_budget(entries, self.budget);

        if let Err(e) = self.persist.save(kind.namespace(), identity, entries).await {
            warn!("Memory write for {} failed, kept in cache: {}", key, e);
        }
    }

    /// Everything remembered about an identity, oldest first. Never trims.
    pub async fn recall(&self, kind: MemoryKind, identity: &str) -> Vec<MemoryEntry> {
        let key = Self::cache_key(kind, identity);
        let mut cache = self.cache.lock().await;

        if let Some(entries) = cache.get(&key) {
            return entries.clone();
        }

        let loaded = self
            .persist
            .load(kind.namespace(), identity, Vec::new())
            .await;
        cache.insert(key, loaded.clone());
        loaded
    }

    /// Drop everything remembered about an identity.
    pub async fn forget(&self, kind: MemoryKind, identity: &str) -> anyhow::Result<()> {
        let key = Self::cache_key(kind, identity);
        self.cache.lock().await.remove(&key);
        self.persist.remove(kind.namespace(), identity).await
    }
}

fn trim_to_budget(entries: &mut Vec<MemoryEntry>, budget: usize) {
    let mut total: usize = entries.iter().map(|e| e.content.chars().count()).sum();
    while total > budget && !entries.is_empty() {
        let dropped = entries.remove(0);
        total -= dropped.content.chars().count();
    }
}

/// Authors can ask for a message to be left out of memory.
pub fn should_skip_memory(text: &str) -> bool {
    let lowered = text.to_lowercase();
    [
        "no memory",
        "don't remember",
        "dont remember",
        "do not remember",
        "don't save",
        "dont save",
        "do not save",
        "forget this",
        "incognito",
        "off the record",
    ]
    .iter()
    .any(|p| lowered.contains(p))
}

/// Char-safe truncation with an ellipsis marker.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(budget: usize) -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
        (dir, MemoryStore::new(persist, budget))
    }

    async fn total_chars(store: &MemoryStore, identity: &str) -> usize {
        store
            .recall(MemoryKind::User, identity)
            .await
            .iter()
            .map(|e| e.content.chars().count())
            .sum()
    }

    #[tokio::test]
    async fn append_then_recall() {
        let (_dir, store) = store(DEFAULT_MEMORY_BUDGET);
        store.append(MemoryKind::User, "1", "likes rust").await;
        store.append(MemoryKind::User, "1", "plays chess").await;

        let entries = store.recall(MemoryKind::User, "1").await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "likes rust");
        assert_eq!(entries[1].content, "plays chess");
    }

    #[tokio::test]
    async fn budget_holds_after_every_append() {
        let (_dir, store) = store(100);
        for i in 0..20 {
            store
                .append(MemoryKind::User, "1", &format!("entry number {:02}", i))
                .await;
            assert!(total_chars(&store, "1").await <= 100);
        }
    }

    #[tokio::test]
    async fn trim_drops_the_oldest_entry_first() {
        let (_dir, store) = store(1000);
        store.append(MemoryKind::User, "1", &"a".repeat(900)).await;
        store.append(MemoryKind::User, "1", &"b".repeat(200)).await;

        let entries = store.recall(MemoryKind::User, "1").await;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].content.starts_with('b'));
        assert!(total_chars(&store, "1").await <= 1000);
    }

    #[tokio::test]
    async fn oversized_single_entry_trims_to_empty() {
        let (_dir, store) = store(50);
        store.append(MemoryKind::User, "1", &"x".repeat(80)).await;
        assert!(store.recall(MemoryKind::User, "1").await.is_empty());
    }

    #[tokio::test]
    async fn kinds_are_separate_shelves() {
        let (_dir, store) = store(1000);
        store.append(MemoryKind::User, "1", "user fact").await;
        store.append(MemoryKind::Clone, "1", "scope fact").await;

        assert_eq!(store.recall(MemoryKind::User, "1").await.len(), 1);
        assert_eq!(
            store.recall(MemoryKind::Clone, "1").await[0].content,
            "scope fact"
        );
    }

    #[tokio::test]
    async fn memory_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
            let store = MemoryStore::new(persist, 1000);
            store.append(MemoryKind::User, "1", "durable fact").await;
        }

        let persist = Arc::new(PersistenceLayer::new(dir.path(), "test-secret"));
        let store = MemoryStore::new(persist, 1000);
        let entries = store.recall(MemoryKind::User, "1").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "durable fact");
    }

    #[tokio::test]
    async fn forget_clears_cache_and_disk() {
        let (_dir, store) = store(1000);
        store.append(MemoryKind::User, "1", "ephemeral").await;
        store.forget(MemoryKind::User, "1").await.unwrap();
        assert!(store.recall(MemoryKind::User, "1").await.is_empty());
    }

    #[test]
    fn skip_phrases_are_detected() {
        assert!(should_skip_memory("this is off the record, ok?"));
        assert!(should_skip_memory("please DON'T REMEMBER this"));
        assert!(!should_skip_memory("remember that I like concise answers"));
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 3), "hél...");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
