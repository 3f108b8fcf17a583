//! Inbound message content extraction.
//!
//! Turns a raw message into an ordered list of typed blocks plus the
//! leftover URLs nothing claimed. Rules run in a fixed order; a `seen` set
//! keyed by query-stripped URL stops the same media appearing twice across
//! rules, and a `skip` set keeps a converted URL's original form out of the
//! generic bucket.

pub mod providers;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use providers::LinkExtractor;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// One typed unit of multimodal content. Transient per extraction call,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text { text: String },
    ImageUrl { url: String },
    File { filename: String, data: String },
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub blocks: Vec<Block>,
    pub generic_urls: Vec<String>,
}

/// The slice of an inbound message the extractor cares about.
#[derive(Debug, Default, Clone)]
pub struct InboundContent {
    pub text: String,
    pub attachments: Vec<AttachmentRef>,
    pub sticker_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size: u32,
}

impl InboundContent {
    pub fn from_message(message: &serenity::all::Message) -> Self {
        Self {
            text: message.content.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| AttachmentRef {
                    url: a.url.clone(),
                    filename: a.filename.clone(),
                    content_type: a.content_type.clone(),
                    size: a.size,
                })
                .collect(),
            sticker_urls: message
                .sticker_items
                .iter()
                .filter_map(|s| s.image_url())
                .collect(),
        }
    }
}

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("static url pattern"));

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "log", "csv", "json"];

/// Attachments above this are referenced, never inlined.
const MAX_INLINE_ATTACHMENT_BYTES: u32 = 2 * 1024 * 1024;

/// Tracking parameters must not defeat deduplication.
pub fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn trim_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ')', ']'])
}

fn extension_of(url: &str) -> Option<String> {
    let path = strip_query(url);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

fn has_image_extension(url: &str) -> bool {
    extension_of(url).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn has_text_extension(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

pub struct ContentExtractor {
    http: reqwest::Client,
    extractors: Vec<Box<dyn LinkExtractor>>,
}

impl ContentExtractor {
    pub fn new(http: reqwest::Client, tenor_api_key: Option<String>) -> Self {
        let extractors: Vec<Box<dyn LinkExtractor>> = vec![
            Box::new(providers::TenorGifExtractor::new(
                http.clone(),
                tenor_api_key,
            )),
            Box::new(providers::SocialEmbedExtractor::new(http.clone())),
        ];
        Self { http, extractors }
    }

    /// Run every extraction rule in order. A failed enrichment degrades
    /// that one item; it never aborts the rest.
    pub async fn extract(&self, message: &InboundContent) -> Extraction {
        let mut blocks = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut skip: HashSet<String> = HashSet::new();
        let mut leftover_urls: Vec<String> = Vec::new();

        // Stickers resolve straight to their image URL.
        for url in &message.sticker_urls {
            if seen.insert(strip_query(url).to_string()) {
                blocks.push(Block::ImageUrl { url: url.clone() });
            }
        }

        // Attachments: images stay references, PDF and text bodies are
        // inlined so the model sees their contents.
        for attachment in &message.attachments {
            self.extract_attachment(attachment, &mut blocks, &mut seen, &mut leftover_urls)
                .await;
        }

        // Inline image links, classified by extension alone.
        for found in URL_RE.find_iter(&message.text) {
            let url = trim_url(found.as_str());
            if has_image_extension(url) && seen.insert(strip_query(url).to_string()) {
                blocks.push(Block::ImageUrl {
                    url: url.to_string(),
                });
            }
        }

        // Provider rules: GIF lookup, social embeds.
        for extractor in &self.extractors {
            for link in extractor.matches(&message.text) {
                let stripped = strip_query(&link).to_string();
                if seen.contains(&stripped) {
                    continue;
                }
                match extractor.resolve(&link).await {
                    Ok(resolved) if !resolved.is_empty() => {
                        seen.insert(stripped);
                        skip.insert(link);
                        blocks.extend(resolved);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!("{} could not resolve {}: {}", extractor.name(), link, e);
                    }
                }
            }
        }

        // Whatever is left over is handed back as a plain URL.
        let mut generic_urls = Vec::new();
        let mut generic_seen: HashSet<String> = HashSet::new();
        let candidates = URL_RE
            .find_iter(&message.text)
            .map(|m| trim_url(m.as_str()).to_string())
            .chain(leftover_urls);
        for url in candidates {
            if skip.contains(&url) {
                continue;
            }
            let stripped = strip_query(&url).to_string();
            if seen.contains(&stripped) || !generic_seen.insert(stripped) {
                continue;
            }
            generic_urls.push(url);
        }

        Extraction {
            blocks,
            generic_urls,
        }
    }

    async fn extract_attachment(
        &self,
        attachment: &AttachmentRef,
        blocks: &mut Vec<Block>,
        seen: &mut HashSet<String>,
        leftover_urls: &mut Vec<String>,
    ) {
        let stripped = strip_query(&attachment.url).to_string();
        if seen.contains(&stripped) {
            return;
        }

        let content_type = attachment.content_type.as_deref().unwrap_or("");
        let inline_worthy = content_type == "application/pdf"
            || content_type.starts_with("text/")
            || has_text_extension(&attachment.filename);

        if content_type.starts_with("image/") || has_image_extension(&attachment.url) {
            seen.insert(stripped);
            blocks.push(Block::ImageUrl {
                url: attachment.url.clone(),
            });
        } else if inline_worthy && attachment.size <= MAX_INLINE_ATTACHMENT_BYTES {
            seen.insert(stripped);
            match self.download(&attachment.url).await {
                Ok(bytes) => blocks.push(Block::File {
                    filename: attachment.filename.clone(),
                    data: BASE64.encode(&bytes),
                }),
                Err(e) => {
                    warn!("Failed to fetch attachment {}: {}", attachment.filename, e);
                    blocks.push(Block::Text {
                        text: format!("[attachment: {} ({})]", attachment.filename, attachment.url),
                    });
                }
            }
        } else {
            leftover_urls.push(attachment.url.clone());
        }
    }

    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(reqwest::Client::new(), None)
    }

    fn attachment(url: &str, filename: &str, content_type: Option<&str>) -> AttachmentRef {
        AttachmentRef {
            url: url.to_string(),
            filename: filename.to_string(),
            content_type: content_type.map(str::to_string),
            size: 1024,
        }
    }

    #[test]
    fn query_strings_are_stripped_for_dedup() {
        assert_eq!(
            strip_query("https://a.example/x.png?utm_source=b"),
            "https://a.example/x.png"
        );
        assert_eq!(strip_query("https://a.example/x.png"), "https://a.example/x.png");
    }

    #[test]
    fn image_extension_detection_ignores_queries() {
        assert!(has_image_extension("https://a.example/pic.PNG?w=100"));
        assert!(has_image_extension("https://a.example/pic.webp"));
        assert!(!has_image_extension("https://a.example/page.html"));
        assert!(!has_image_extension("https://a.example/pic"));
    }

    #[tokio::test]
    async fn plain_text_yields_no_blocks() {
        let out = extractor()
            .extract(&InboundContent {
                text: "just words".to_string(),
                ..Default::default()
            })
            .await;
        assert!(out.blocks.is_empty());
        assert!(out.generic_urls.is_empty());
    }

    #[tokio::test]
    async fn inline_image_url_becomes_a_block() {
        let out = extractor()
            .extract(&InboundContent {
                text: "look https://a.example/cat.png wow".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(
            out.blocks,
            vec![Block::ImageUrl {
                url: "https://a.example/cat.png".to_string()
            }]
        );
        assert!(out.generic_urls.is_empty());
    }

    #[tokio::test]
    async fn attachment_and_inline_duplicate_dedupes_to_one_block() {
        let out = extractor()
            .extract(&InboundContent {
                text: "same pic inline https://a.example/cat.png?utm=1".to_string(),
                attachments: vec![attachment(
                    "https://a.example/cat.png",
                    "cat.png",
                    Some("image/png"),
                )],
                ..Default::default()
            })
            .await;

        let image_blocks = out
            .blocks
            .iter()
            .filter(|b| matches!(b, Block::ImageUrl { .. }))
            .count();
        assert_eq!(image_blocks, 1);
        assert!(out.generic_urls.is_empty());
    }

    #[tokio::test]
    async fn unclassified_urls_land_in_the_generic_bucket() {
        let out = extractor()
            .extract(&InboundContent {
                text: "read https://blog.example/post and https://blog.example/post?ref=x"
                    .to_string(),
                ..Default::default()
            })
            .await;
        assert!(out.blocks.is_empty());
        // The two forms differ only by query string; one survives.
        assert_eq!(out.generic_urls, vec!["https://blog.example/post".to_string()]);
    }

    #[tokio::test]
    async fn sticker_urls_become_image_blocks() {
        let out = extractor()
            .extract(&InboundContent {
                sticker_urls: vec!["https://cdn.example/sticker/1.png".to_string()],
                ..Default::default()
            })
            .await;
        assert_eq!(
            out.blocks,
            vec![Block::ImageUrl {
                url: "https://cdn.example/sticker/1.png".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn unknown_attachment_type_falls_through_to_generic() {
        let out = extractor()
            .extract(&InboundContent {
                attachments: vec![attachment(
                    "https://cdn.example/archive.zip",
                    "archive.zip",
                    Some("application/zip"),
                )],
                ..Default::default()
            })
            .await;
        assert!(out.blocks.is_empty());
        assert_eq!(
            out.generic_urls,
            vec!["https://cdn.example/archive.zip".to_string()]
        );
    }

    #[tokio::test]
    async fn trailing_punctuation_is_not_part_of_the_url() {
        let out = extractor()
            .extract(&InboundContent {
                text: "see https://a.example/cat.png, neat".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(
            out.blocks,
            vec![Block::ImageUrl {
                url: "https://a.example/cat.png".to_string()
            }]
        );
    }
}
