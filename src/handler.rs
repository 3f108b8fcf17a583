//! Inbound message handling.
//!
//! The whole reply pipeline lives here: admission, thread resolution,
//! content extraction, prompt assembly, the model call, and the bookkeeping
//! that follows a sent reply. Solicited messages (mention, reply to the
//! agent, DM) answer directly; everything else rides the interjection gate
//! and a per-(channel, author) debounce.

use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::extract::{Block, InboundContent};
use crate::history::HistoryLine;
use crate::llm::LlmError;
use crate::memory::{self, MemoryKind};
use crate::prompt::{PromptAssembler, PromptRequest};
use crate::scope::ScopeKey;
use crate::thread::{ChatMessage, Role};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const QUOTA_FALLBACK: &str =
    "I can't think right now (my usage limit is spent). Try me again in a while.";

/// Messages shorter than this are not worth remembering.
const MIN_MEMORABLE_CHARS: usize = 12;

pub async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    if message.author.bot {
        return Ok(());
    }

    // Every human line feeds the channel-history snippet, replied-to or not.
    data.session.history.push(
        &message.channel_id.to_string(),
        HistoryLine {
            display_name: ChatMessage::sanitize_display_name(&message.author.name),
            content: message.content.clone(),
            from_agent: false,
        },
    );

    let guild_id = message.guild_id.map(|id| id.get());
    let scope = data.config.scope_mode.scope_for(guild_id, message.author.id.get());
    let settings = data.settings.get(&scope);
    let identity = message.author.id.to_string();

    if is_solicited(message, data.bot_id, guild_id.is_none()) {
        // Check and arm back-to-back; no await may separate them.
        if !data.session.gate.admit(&settings, Some(&scope), &identity) {
            debug!(
                "Cooldown active, suppressing reply in channel {}",
                message.channel_id
            );
            return Ok(());
        }
        data.session.gate.arm(&settings, Some(&scope), &identity);

        respond(ctx, message, data, scope).await?;
    } else if data.session.gate.should_interject(&settings) {
        let delay = Duration::from_secs(data.config.interjection_debounce_secs);
        let channel = message.channel_id.get();
        let author = message.author.id.get();

        info!(
            "Interjection drawn for channel {}, deferring {}s",
            channel,
            delay.as_secs()
        );

        let deferred_ctx = ctx.clone();
        let deferred_message = message.clone();
        let deferred_data = data.clone();
        data.session.gate.debounce_interjection(channel, author, delay, async move {
            // Unsolicited replies still pass the cooldown; settings are
            // re-read in case they changed while the timer ran.
            let data = deferred_data;
            let message = deferred_message;
            let scope = data
                .config
                .scope_mode
                .scope_for(message.guild_id.map(|id| id.get()), message.author.id.get());
            let settings = data.settings.get(&scope);
            let identity = message.author.id.to_string();
            if !data.session.gate.admit(&settings, Some(&scope), &identity) {
                return;
            }
            data.session.gate.arm(&settings, Some(&scope), &identity);

            if let Err(e) = respond(&deferred_ctx, &message, &data, scope).await {
                error!("Interjection reply failed: {}", e);
            }
        });
    }

    Ok(())
}

/// Produce one reply to `message` and record its aftermath.
async fn respond(
    ctx: &serenity::Context,
    message: &serenity::Message,
    data: &Data,
    scope: ScopeKey,
) -> Result<(), Error> {
    data.session.resolver.ensure_scope(&scope).await;

    let channel_id = message.channel_id.to_string();
    let inbound = inbound_chat_message(message, data.bot_id);
    let thread_id = data
        .session
        .resolver
        .resolve_thread_id(&scope, &channel_id, &inbound);

    let mut blocks: Vec<Block> = Vec::new();
    if let Some(evicted) = data.session.resolver.record(&scope, &thread_id, inbound.clone()) {
        // The archive took the live bodies with it, the current turn
        // included; re-surface the text directly and condense the rest
        // into memory before the prompt is assembled.
        if evicted.iter().any(|m| m.id == inbound.id) {
            blocks.push(Block::Text {
                text: format!("[{}]: {}", inbound.display_name, inbound.content),
            });
        }
        data.summarizer.archive(&scope, &evicted).await;
    }

    let typing = message.channel_id.start_typing(&ctx.http);

    let mut extraction = data.extractor.extract(&InboundContent::from_message(message)).await;
    blocks.append(&mut extraction.blocks);
    if !extraction.generic_urls.is_empty() {
        blocks.push(Block::Text {
            text: format!("Links shared: {}", extraction.generic_urls.join(" ")),
        });
    }

    let mut recalled = data.memory.recall(MemoryKind::Clone, scope.as_str()).await;
    recalled.extend(
        data.memory
            .recall(MemoryKind::User, &author_memory_key(&inbound))
            .await,
    );

    let history = data.session.history.snippet(&channel_id);
    let thread = data.session.resolver.thread(&scope, &thread_id);

    let messages = PromptAssembler::build(&PromptRequest {
        persona: &data.config.persona,
        memory: &recalled,
        history: &history,
        thread: thread.as_ref(),
        start_message_id: &inbound.id,
        blocks: &blocks,
    })?;

    let response = match data.llm.chat(messages).await {
        Ok(text) => text,
        Err(LlmError::QuotaExceeded) => {
            warn!("Model quota exhausted, sending fallback");
            QUOTA_FALLBACK.to_string()
        }
        Err(e) => {
            error!("Model call failed: {}", e);
            drop(typing);
            return Ok(());
        }
    };
    drop(typing);

    let sent_ids = send_reply(ctx, message.channel_id, message.id, &response).await?;

    // Record the assistant turn so the next reply in the chain inherits
    // this thread, then snapshot the scope.
    if let Some(reply_id) = sent_ids.first() {
        let assistant = ChatMessage {
            id: reply_id.to_string(),
            role: Role::Assistant,
            display_name: data.config.agent_name.clone(),
            author_id: None,
            content: response.clone(),
            reply_to_id: Some(inbound.id.clone()),
            attachment_refs: Vec::new(),
        };
        if let Some(evicted) = data.session.resolver.record(&scope, &thread_id, assistant) {
            data.summarizer.archive(&scope, &evicted).await;
        }

        data.session.history.push(
            &channel_id,
            HistoryLine {
                display_name: data.config.agent_name.clone(),
                content: response.clone(),
                from_agent: true,
            },
        );
    }

    remember_author(data, &inbound).await;
    data.session.resolver.persist_scope(&scope).await;

    info!(
        "Replied to {} in channel {} (thread {})",
        inbound.display_name, channel_id, thread_id
    );
    Ok(())
}

/// Keep a short record of what the author said, unless they asked not to.
async fn remember_author(data: &Data, inbound: &ChatMessage) {
    let content = inbound.content.trim();
    if content.chars().count() < MIN_MEMORABLE_CHARS || memory::should_skip_memory(content) {
        return;
    }
    let line = format!(
        "{}: {}",
        inbound.display_name,
        memory::truncate_chars(content, 180)
    );
    data.memory
        .append(MemoryKind::User, &author_memory_key(inbound), &line)
        .await;
}

/// User-memory shelf key for a turn's author.
fn author_memory_key(turn: &ChatMessage) -> String {
    turn.author_id.clone().unwrap_or_else(|| turn.id.clone())
}

/// A message solicits a reply when it mentions the agent, replies to the
/// agent, or arrives in a DM.
fn is_solicited(message: &serenity::Message, bot_id: u64, is_dm: bool) -> bool {
    if is_dm {
        return true;
    }
    if message.mentions.iter().any(|user| user.id.get() == bot_id) {
        return true;
    }
    message
        .referenced_message
        .as_deref()
        .is_some_and(|referenced| referenced.author.id.get() == bot_id)
}

fn inbound_chat_message(message: &serenity::Message, bot_id: u64) -> ChatMessage {
    let reply_to_id = message
        .referenced_message
        .as_deref()
        .map(|referenced| referenced.id.to_string())
        .or_else(|| {
            message
                .message_reference
                .as_ref()
                .and_then(|reference| reference.message_id)
                .map(|id| id.to_string())
        });

    ChatMessage {
        id: message.id.to_string(),
        role: Role::User,
        display_name: ChatMessage::sanitize_display_name(&message.author.name),
        author_id: Some(message.author.id.to_string()),
        content: strip_agent_mentions(&message.content, bot_id),
        reply_to_id,
        attachment_refs: message.attachments.iter().map(|a| a.url.clone()).collect(),
    }
}

fn strip_agent_mentions(input: &str, bot_id: u64) -> String {
    let mention = format!("<@{}>", bot_id);
    let mention_nick = format!("<@!{}>", bot_id);

    input
        .replace(&mention, "")
        .replace(&mention_nick, "")
        .trim()
        .to_string()
}

async fn send_reply(
    ctx: &serenity::Context,
    channel_id: serenity::ChannelId,
    reply_to: serenity::MessageId,
    text: &str,
) -> Result<Vec<serenity::MessageId>, Error> {
    let text = if text.trim().is_empty() { "…" } else { text };

    let mut sent_ids = Vec::new();
    for (index, chunk) in chunk_text(text, DISCORD_MESSAGE_LIMIT).into_iter().enumerate() {
        let mut builder = serenity::CreateMessage::new().content(chunk);
        if index == 0 {
            builder = builder
                .reference_message(serenity::MessageReference::from((channel_id, reply_to)));
        }
        let sent = channel_id.send_message(&ctx.http, builder).await?;
        sent_ids.push(sent.id);
    }
    Ok(sent_ids)
}

fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for ch in text.chars() {
        if current_len == limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(ch);
        current_len += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
