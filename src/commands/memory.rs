use crate::memory::MemoryKind;
use crate::{Context, Error};
use chrono::DateTime;
use poise::serenity_prelude as serenity;

/// Inspect what the agent remembers about you
#[poise::command(slash_command, subcommands("show", "forget"))]
pub async fn memory(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show your stored recollections
#[poise::command(slash_command)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let entries = ctx
        .data()
        .memory
        .recall(MemoryKind::User, &ctx.author().id.to_string())
        .await;

    if entries.is_empty() {
        ctx.say("📭 I don't remember anything about you yet.").await?;
        return Ok(());
    }

    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            let when = DateTime::from_timestamp_millis(entry.timestamp)
                .map(|ts| ts.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "?".to_string());
            format!("`{}` {}", when, entry.content)
        })
        .collect();

    let embed = serenity::CreateEmbed::new()
        .title("🧠 What I remember about you")
        .description(lines.join("\n"))
        .color(0x5865F2);

    ctx.send(
        poise::CreateReply::default()
            .embed(embed)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Delete everything the agent remembers about you
#[poise::command(slash_command)]
pub async fn forget(ctx: Context<'_>) -> Result<(), Error> {
    ctx.data()
        .memory
        .forget(MemoryKind::User, &ctx.author().id.to_string())
        .await?;
    ctx.say("✅ Forgotten. Clean slate.").await?;
    Ok(())
}
