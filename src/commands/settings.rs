use crate::settings::MIN_INTERJECTION_RATE;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Manage how often the agent replies here
#[poise::command(
    slash_command,
    subcommands("show", "cooldown", "interjection"),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn settings(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn scope_of(ctx: &Context<'_>) -> Result<crate::scope::ScopeKey, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be run in a guild")?;
    Ok(ctx
        .data()
        .config
        .scope_mode
        .scope_for(Some(guild_id.get()), ctx.author().id.get()))
}

/// Show the current reply-rate settings
#[poise::command(slash_command)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let scope = scope_of(&ctx)?;
    let settings = ctx.data().settings.get(&scope);

    let cooldown_state = if settings.cooldown.use_cooldown {
        format!("`{}s`", settings.cooldown.cooldown_time)
    } else {
        "disabled".to_string()
    };
    let cooldown_key = if settings.cooldown.per_user_cooldown {
        "per user"
    } else {
        "per server"
    };

    let embed = serenity::CreateEmbed::new()
        .title("⏱️ Reply Settings")
        .field("Cooldown", cooldown_state, true)
        .field("Cooldown key", cooldown_key, true)
        .field(
            "Interjection odds",
            format!("1 in `{}`", settings.interjection_rate),
            true,
        )
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Configure the reply cooldown
#[poise::command(slash_command)]
pub async fn cooldown(
    ctx: Context<'_>,
    #[description = "Enable or disable the cooldown"] enabled: Option<bool>,
    #[description = "Cooldown length in seconds"]
    #[max = 3600]
    seconds: Option<u64>,
    #[description = "Track the cooldown per user instead of per server"] per_user: Option<bool>,
) -> Result<(), Error> {
    if enabled.is_none() && seconds.is_none() && per_user.is_none() {
        ctx.say("❌ Specify at least one of enabled, seconds or per_user.")
            .await?;
        return Ok(());
    }

    let scope = scope_of(&ctx)?;
    let updated = ctx
        .data()
        .settings
        .set_cooldown(&scope, enabled, seconds, per_user)
        .await?;

    let state = if updated.cooldown.use_cooldown {
        format!("enabled ({}s)", updated.cooldown.cooldown_time)
    } else {
        "disabled".to_string()
    };
    ctx.say(format!("✅ Cooldown is now {}.", state)).await?;
    Ok(())
}

/// Configure how rarely the agent interjects uninvited
#[poise::command(slash_command)]
pub async fn interjection(
    ctx: Context<'_>,
    #[description = "Reply to roughly 1 in N unaddressed messages (minimum 50)"] rate: u32,
) -> Result<(), Error> {
    let scope = scope_of(&ctx)?;

    match ctx.data().settings.set_interjection_rate(&scope, rate).await {
        Ok(updated) => {
            ctx.say(format!(
                "✅ I'll now interject on roughly 1 in {} messages.",
                updated.interjection_rate
            ))
            .await?;
        }
        Err(_) => {
            // Bad input goes back to the caller, not to the logs.
            ctx.say(format!(
                "❌ The interjection rate must be at least {}.",
                MIN_INTERJECTION_RATE
            ))
            .await?;
        }
    }
    Ok(())
}
