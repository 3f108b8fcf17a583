//! Prompt assembly.
//!
//! Composes persona, recalled memory, the channel-history snippet and the
//! reconstructed reply chain into the ordered message list handed to the
//! model. The prepend order is fixed; providers weight later entries more
//! heavily, so the live conversation must come after background context.

use crate::extract::Block;
use crate::history::HistoryLine;
use crate::memory::MemoryEntry;
use crate::thread::{ChatMessage, ConversationThread, Role};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
    ImageUrlArgs,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const REPLY_CONTEXT_NOTE: &str =
    "You are replying inside an ongoing reply chain. Stay consistent with what was already said \
     and answer the latest message.";

const FORMATTING_GUIDE: &str =
    "Write plain conversational Discord messages. Use Discord markdown sparingly (bold, italics, \
     code blocks); no headings, no tables. Keep replies under 2000 characters.";

pub struct PromptRequest<'a> {
    pub persona: &'a str,
    pub memory: &'a [MemoryEntry],
    pub history: &'a [HistoryLine],
    pub thread: Option<&'a ConversationThread>,
    pub start_message_id: &'a str,
    pub blocks: &'a [Block],
}

pub struct PromptAssembler;

impl PromptAssembler {
    /// Build the ordered message list: persona, memory, reply-context note,
    /// channel history, formatting guide, the reconstructed thread, then
    /// the extracted blocks. A build with nothing else to say still emits a
    /// single empty-text user block.
    pub fn build(request: &PromptRequest<'_>) -> anyhow::Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        messages.push(system(request.persona)?);

        if !request.memory.is_empty() {
            let recalled: Vec<String> = request
                .memory
                .iter()
                .map(|e| format!("- {}", e.content))
                .collect();
            messages.push(system(&format!(
                "Things you remember from past conversations:\n{}",
                recalled.join("\n")
            ))?);
        }

        messages.push(system(REPLY_CONTEXT_NOTE)?);

        if !request.history.is_empty() {
            let lines: Vec<String> = request
                .history
                .iter()
                .map(|line| {
                    if line.from_agent {
                        format!("(you): {}", line.content)
                    } else {
                        format!("[{}]: {}", line.display_name, line.content)
                    }
                })
                .collect();
            messages.push(system(&format!(
                "Recent channel messages:\n{}",
                lines.join("\n")
            ))?);
        }

        messages.push(system(FORMATTING_GUIDE)?);

        let chain = reconstruct_chain(request.thread, request.start_message_id);
        for turn in &chain {
            messages.push(turn_message(turn)?);
        }

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = request
            .blocks
            .iter()
            .map(block_part)
            .collect::<anyhow::Result<_>>()?;

        if !parts.is_empty() {
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(parts))
                    .build()?
                    .into(),
            );
        } else if chain.is_empty() {
            // An empty turn is rejected by the provider, so emit one empty
            // text block rather than nothing.
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content("")
                    .build()?
                    .into(),
            );
        }

        Ok(messages)
    }
}

/// Walk backward from the start message via reply references, stopping at
/// a missing parent, then flip to oldest-first.
fn reconstruct_chain(thread: Option<&ConversationThread>, start_id: &str) -> Vec<ChatMessage> {
    let Some(thread) = thread else {
        return Vec::new();
    };

    let mut chain = Vec::new();
    let mut cursor = thread.messages.get(start_id);
    while let Some(message) = cursor {
        chain.push(message.clone());
        if chain.len() > thread.messages.len() {
            break;
        }
        cursor = message
            .reply_to_id
            .as_deref()
            .and_then(|parent| thread.messages.get(parent));
    }
    chain.reverse();
    chain
}

fn system(content: &str) -> anyhow::Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(content.to_string())
        .build()?
        .into())
}

fn turn_message(turn: &ChatMessage) -> anyhow::Result<ChatCompletionRequestMessage> {
    match turn.role {
        Role::Assistant => Ok(ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into()),
        // Speaker attribution lets the model tell multi-party threads apart.
        Role::User => Ok(ChatCompletionRequestUserMessageArgs::default()
            .content(format!("[{}]: {}", turn.display_name, turn.content))
            .build()?
            .into()),
    }
}

fn block_part(block: &Block) -> anyhow::Result<ChatCompletionRequestUserMessageContentPart> {
    match block {
        Block::Text { text } => Ok(ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(text.clone())
            .build()?
            .into()),
        Block::ImageUrl { url } => Ok(ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(ImageUrlArgs::default().url(url.clone()).build()?)
            .build()?
            .into()),
        Block::File { filename, data } => {
            let text = match BASE64
                .decode(data)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                Some(body) => format!("Attachment {}:\n{}", filename, body),
                None => format!("[binary attachment: {}]", filename),
            };
            Ok(ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(text)
                .build()?
                .into())
        }
    }
}
