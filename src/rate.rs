//! Reply admission control.
//!
//! Two independent gates: a per-context cooldown that closes after every
//! reply, and a probability draw that decides whether an unsolicited
//! message gets a reply at all. An unsolicited reply must pass both.

use crate::scope::ScopeKey;
use crate::settings::GuildSettings;
use crate::timer::DelayedTasks;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

pub struct RateGate {
    cooldowns: DelayedTasks,
    debounce: DelayedTasks,
}

impl RateGate {
    pub fn new() -> Self {
        Self {
            cooldowns: DelayedTasks::new(),
            debounce: DelayedTasks::new(),
        }
    }

    /// Cooldowns key by scope unless configured per-user; a message with no
    /// scope (a DM) always keys by the author.
    fn context_key(settings: &GuildSettings, scope: Option<&ScopeKey>, identity: &str) -> String {
        match scope {
            Some(scope) if !settings.cooldown.per_user_cooldown => scope.as_str().to_string(),
            _ => identity.to_string(),
        }
    }

    /// Whether a reply may be produced for this context right now. Callers
    /// must invoke `arm` immediately after a true result, with no await
    /// point in between.
    pub fn admit(&self, settings: &GuildSettings, scope: Option<&ScopeKey>, identity: &str) -> bool {
        if !settings.cooldown.use_cooldown {
            return true;
        }
        !self
            .cooldowns
            .is_pending(&Self::context_key(settings, scope, identity))
    }

    /// Start the self-clearing cooldown timer. No-op when cooldown is
    /// disabled or a timer is already running for the key.
    pub fn arm(&self, settings: &GuildSettings, scope: Option<&ScopeKey>, identity: &str) {
        if !settings.cooldown.use_cooldown {
            return;
        }
        let key = Self::context_key(settings, scope, identity);
        self.cooldowns.start(
            &key,
            Duration::from_secs(settings.cooldown.cooldown_time),
            async {},
        );
    }

    /// One draw at probability 1 in `interjection_rate`, taken once per
    /// eligible unsolicited message.
    pub fn should_interject(&self, settings: &GuildSettings) -> bool {
        Self::should_interject_with(&mut rand::rng(), settings.interjection_rate)
    }

    fn should_interject_with<R: Rng>(rng: &mut R, denominator: u32) -> bool {
        rng.random_range(0..denominator.max(1)) == 0
    }

    /// Defer an unsolicited reply, replacing any reply already pending for
    /// the same (channel, author) pair.
    pub fn debounce_interjection<F>(&self, channel_id: u64, author_id: u64, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.debounce
            .restart(&format!("{}:{}", channel_id, author_id), delay, task);
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}
