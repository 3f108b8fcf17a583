//! Recent-channel-lines cache.
//!
//! Feeds the channel-history snippet of the prompt. Bounded two ways: an
//! LRU over channels, and a fixed number of lines per channel.

use lru::LruCache;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub const DEFAULT_SNIPPET_LINES: usize = 12;

#[derive(Debug, Clone)]
pub struct HistoryLine {
    pub display_name: String,
    pub content: String,
    pub from_agent: bool,
}

pub struct ChannelHistory {
    channels: Mutex<LruCache<String, VecDeque<HistoryLine>>>,
    per_channel: usize,
}

impl ChannelHistory {
    pub fn new(max_channels: usize, per_channel: usize) -> Self {
        let cap = NonZeroUsize::new(max_channels).unwrap_or(NonZeroUsize::new(64).unwrap());
        Self {
            channels: Mutex::new(LruCache::new(cap)),
            per_channel: per_channel.max(1),
        }
    }

    pub fn push(&self, channel_id: &str, line: HistoryLine) {
        let mut channels = self.channels.lock().unwrap();
        let lines = channels.get_or_insert_mut(channel_id.to_string(), VecDeque::new);
        lines.push_back(line);
        while lines.len() > self.per_channel {
            lines.pop_front();
        }
    }

    /// The channel's recent lines, oldest first.
    pub fn snippet(&self, channel_id: &str) -> Vec<HistoryLine> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .get(channel_id)
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}
