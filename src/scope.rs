//! Identity partitioning for threads and rate limits.

use serde::{Deserialize, Serialize};

/// How conversation state is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMode {
    /// One scope per guild; direct messages fall back to the peer's user id.
    #[default]
    Guild,
    /// One scope per user, everywhere.
    User,
}

impl ScopeMode {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "guild" => Ok(Self::Guild),
            "user" => Ok(Self::User),
            other => anyhow::bail!("Unknown scope mode '{}' (expected guild or user)", other),
        }
    }

    /// Compute the scope an inbound message belongs to.
    pub fn scope_for(self, guild_id: Option<u64>, author_id: u64) -> ScopeKey {
        match self {
            Self::Guild => match guild_id {
                Some(gid) => ScopeKey::new(gid.to_string()),
                None => ScopeKey::new(author_id.to_string()),
            },
            Self::User => ScopeKey::new(author_id.to_string()),
        }
    }
}

/// The partition key under which threads and cooldowns are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_mode_uses_guild_then_peer() {
        let mode = ScopeMode::Guild;
        assert_eq!(mode.scope_for(Some(42), 7).as_str(), "42");
        assert_eq!(mode.scope_for(None, 7).as_str(), "7");
    }

    #[test]
    fn user_mode_always_uses_author() {
        let mode = ScopeMode::User;
        assert_eq!(mode.scope_for(Some(42), 7).as_str(), "7");
        assert_eq!(mode.scope_for(None, 7).as_str(), "7");
    }

    #[test]
    fn parse_rejects_unknown_modes() {
        assert!(ScopeMode::parse("guild").is_ok());
        assert!(ScopeMode::parse("USER").is_ok());
        assert!(ScopeMode::parse("channel").is_err());
    }
}
