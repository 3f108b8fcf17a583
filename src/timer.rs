//! Cancellable delayed tasks.
//!
//! Cooldown expiry and the interjection debounce are both "run something
//! after a delay unless cancelled first". Keys are plain strings; a key is
//! pending from `start` until its delay elapses or it is cancelled. Built
//! on tokio timers so tests can fast-forward the paused clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;

#[derive(Clone, Default)]
pub struct DelayedTasks {
    pending: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl DelayedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after `delay`. Returns false and leaves the
    /// existing timer untouched when the key is already pending.
    pub fn start<F>(&self, key: &str, delay: Duration, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap();
        if pending.contains_key(key) {
            return false;
        }

        let registry = Arc::clone(&self.pending);
        let owned_key = key.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            registry.lock().unwrap().remove(&owned_key);
            task.await;
        });

        pending.insert(key.to_string(), handle.abort_handle());
        true
    }

    /// Schedule `task`, replacing any timer already pending for the key.
    pub fn restart<F>(&self, key: &str, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel(key);
        self.start(key, delay, task);
    }

    /// Abort a pending timer. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.lock().unwrap().remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().unwrap().contains_key(key)
    }
}
