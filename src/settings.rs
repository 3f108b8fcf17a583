//! Per-scope reply-rate configuration.
//!
//! One JSON document maps scope id to its settings. Entries are created
//! lazily on first write; any field missing from the document falls back to
//! its default, so older documents keep loading as the shape grows.

use crate::scope::ScopeKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Interjection odds below this are rejected as configuration input.
pub const MIN_INTERJECTION_RATE: u32 = 50;

pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_INTERJECTION_RATE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CooldownConfig {
    pub use_cooldown: bool,
    /// Seconds a context key stays closed after a reply.
    pub cooldown_time: u64,
    /// Key the cooldown by author instead of by scope.
    pub per_user_cooldown: bool,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            use_cooldown: true,
            cooldown_time: DEFAULT_COOLDOWN_SECS,
            per_user_cooldown: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildSettings {
    pub cooldown: CooldownConfig,
    /// Unsolicited replies fire with probability 1 in `interjection_rate`.
    pub interjection_rate: u32,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            cooldown: CooldownConfig::default(),
            interjection_rate: DEFAULT_INTERJECTION_RATE,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    scopes: Mutex<HashMap<String, GuildSettings>>,
}

impl SettingsStore {
    /// Load the settings document, tolerating a missing or unreadable file.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let scopes = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(scopes) => scopes,
                Err(e) => {
                    warn!("Settings document {} is invalid, starting empty: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            scopes: Mutex::new(scopes),
        }
    }

    /// Settings for a scope, falling back to defaults when none were saved.
    pub fn get(&self, scope: &ScopeKey) -> GuildSettings {
        self.scopes
            .lock()
            .unwrap()
            .get(scope.as_str())
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set_cooldown(
        &self,
        scope: &ScopeKey,
        use_cooldown: Option<bool>,
        cooldown_time: Option<u64>,
        per_user_cooldown: Option<bool>,
    ) -> anyhow::Result<GuildSettings> {
        let updated = {
            let mut scopes = self.scopes.lock().unwrap();
            let entry = scopes.entry(scope.as_str().to_string()).or_default();
            if let Some(enabled) = use_cooldown {
                entry.cooldown.use_cooldown = enabled;
            }
            if let Some(secs) = cooldown_time {
                entry.cooldown.cooldown_time = secs;
            }
            if let Some(per_user) = per_user_cooldown {
                entry.cooldown.per_user_cooldown = per_user;
            }
            entry.clone()
        };

        self.flush().await?;
        Ok(updated)
    }

    pub async fn set_interjection_rate(
        &self,
        scope: &ScopeKey,
        rate: u32,
    ) -> anyhow::Result<GuildSettings> {
        if rate < MIN_INTERJECTION_RATE {
            anyhow::bail!(
                "Interjection rate must be at least {} (got {})",
                MIN_INTERJECTION_RATE,
                rate
            );
        }

        let updated = {
            let mut scopes = self.scopes.lock().unwrap();
            let entry = scopes.entry(scope.as_str().to_string()).or_default();
            entry.interjection_rate = rate;
            entry.clone()
        };

        self.flush().await?;
        Ok(updated)
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let json = {
            let scopes = self.scopes.lock().unwrap();
            serde_json::to_string_pretty(&*scopes)?
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
