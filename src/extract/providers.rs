//! Link-enrichment providers.
//!
//! Each provider owns its own URL patterns and lookup; the orchestrator in
//! `extract` just iterates the registered list, so adding a provider never
//! touches the extraction flow.

use super::Block;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

#[async_trait]
pub trait LinkExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Links in `text` this provider knows how to enrich.
    fn matches(&self, text: &str) -> Vec<String>;

    /// Resolve one link into richer blocks. An empty vec means the link
    /// should fall through to the generic URL bucket.
    async fn resolve(&self, link: &str) -> anyhow::Result<Vec<Block>>;
}

static TENOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?tenor\.com/view/[A-Za-z0-9_-]*?(\d+)\b")
        .expect("static tenor pattern")
});

/// Tenor share links resolve to the underlying GIF through the v2 posts
/// API. Without an API key the provider is a no-op and the link stays a
/// plain URL.
pub struct TenorGifExtractor {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl TenorGifExtractor {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    fn post_id(link: &str) -> Option<String> {
        TENOR_RE
            .captures(link)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[async_trait]
impl LinkExtractor for TenorGifExtractor {
    fn name(&self) -> &str {
        "tenor"
    }

    fn matches(&self, text: &str) -> Vec<String> {
        if self.api_key.is_none() {
            return Vec::new();
        }
        TENOR_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    async fn resolve(&self, link: &str) -> anyhow::Result<Vec<Block>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };
        let Some(post_id) = Self::post_id(link) else {
            return Ok(Vec::new());
        };

        let body: serde_json::Value = self
            .http
            .get("https://tenor.googleapis.com/v2/posts")
            .query(&[("ids", post_id.as_str()), ("key", api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let media_url = body["results"][0]["media_formats"]["gif"]["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("No gif media in Tenor response"))?;

        Ok(vec![Block::ImageUrl {
            url: media_url.to_string(),
        }])
    }
}

static TWEET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?(?:twitter\.com|x\.com)/([A-Za-z0-9_]+)/status/(\d+)")
        .expect("static tweet pattern")
});

/// Twitter/X status links resolve through the keyless fxtwitter API into
/// an image block (first photo, when present) plus a text summary.
pub struct SocialEmbedExtractor {
    http: reqwest::Client,
}

impl SocialEmbedExtractor {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn handle_and_id(link: &str) -> Option<(String, String)> {
        let captures = TWEET_RE.captures(link)?;
        Some((captures[1].to_string(), captures[2].to_string()))
    }
}

#[async_trait]
impl LinkExtractor for SocialEmbedExtractor {
    fn name(&self) -> &str {
        "social-embed"
    }

    fn matches(&self, text: &str) -> Vec<String> {
        TWEET_RE
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    async fn resolve(&self, link: &str) -> anyhow::Result<Vec<Block>> {
        let Some((handle, id)) = Self::handle_and_id(link) else {
            return Ok(Vec::new());
        };

        let body: serde_json::Value = self
            .http
            .get(format!("https://api.fxtwitter.com/{}/status/{}", handle, id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let tweet = &body["tweet"];
        let mut blocks = Vec::new();

        if let Some(photo_url) = tweet["media"]["photos"][0]["url"].as_str() {
            blocks.push(Block::ImageUrl {
                url: photo_url.to_string(),
            });
        }

        if let Some(text) = tweet["text"].as_str() {
            let author = tweet["author"]["screen_name"].as_str().unwrap_or(&handle);
            blocks.push(Block::Text {
                text: format!("[post by @{}] {}", author, text),
            });
        }

        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenor_matches_need_an_api_key() {
        let text = "look https://tenor.com/view/funny-cat-gif-27562958";
        let keyless = TenorGifExtractor::new(reqwest::Client::new(), None);
        assert!(keyless.matches(text).is_empty());

        let keyed = TenorGifExtractor::new(reqwest::Client::new(), Some("k".to_string()));
        assert_eq!(
            keyed.matches(text),
            vec!["https://tenor.com/view/funny-cat-gif-27562958".to_string()]
        );
    }

    #[test]
    fn tenor_post_id_is_the_trailing_number() {
        assert_eq!(
            TenorGifExtractor::post_id("https://tenor.com/view/funny-cat-gif-27562958"),
            Some("27562958".to_string())
        );
        assert_eq!(TenorGifExtractor::post_id("https://tenor.com/about"), None);
    }

    #[test]
    fn tweet_links_match_both_domains() {
        let social = SocialEmbedExtractor::new(reqwest::Client::new());
        let text = "https://twitter.com/alice/status/123 and https://x.com/bob/status/456";
        assert_eq!(
            social.matches(text),
            vec![
                "https://twitter.com/alice/status/123".to_string(),
                "https://x.com/bob/status/456".to_string(),
            ]
        );
    }

    #[test]
    fn tweet_handle_and_id_are_extracted() {
        assert_eq!(
            SocialEmbedExtractor::handle_and_id("https://x.com/bob/status/456?s=20"),
            Some(("bob".to_string(), "456".to_string()))
        );
        assert_eq!(
            SocialEmbedExtractor::handle_and_id("https://x.com/bob"),
            None
        );
    }
}
