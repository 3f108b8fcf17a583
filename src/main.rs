use mimic::{commands, config::Config, handler, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration; missing secrets abort here.
    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![commands::settings::settings(), commands::memory::memory()],
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    if let serenity::FullEvent::Message { new_message } = event {
                        if let Err(e) = handler::handle_message(ctx, new_message, data).await {
                            error!("Message handling failed: {}", e);
                        }
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Connected as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                ctx.set_activity(Some(serenity::ActivityData::custom(&config.status_message)));

                let persist = Arc::new(mimic::persist::PersistenceLayer::new(
                    &config.data_dir,
                    &config.memory_secret,
                ));
                let http = reqwest::Client::new();

                let llm = Arc::new(mimic::llm::LlmClient::new(&config));
                let memory = Arc::new(mimic::memory::MemoryStore::new(
                    Arc::clone(&persist),
                    config.memory_budget,
                ));
                let settings = Arc::new(
                    mimic::settings::SettingsStore::load(
                        std::path::Path::new(&config.data_dir).join("guild_settings.json"),
                    )
                    .await,
                );
                let session = Arc::new(mimic::session::SessionStore::new(
                    Arc::clone(&persist),
                    &config,
                ));
                let extractor = Arc::new(mimic::extract::ContentExtractor::new(
                    http,
                    config.tenor_api_key.clone(),
                ));
                let summarizer = Arc::new(mimic::summarize::ThreadSummarizer::new(
                    Arc::clone(&llm),
                    Arc::clone(&memory),
                ));

                Ok(Data {
                    config: Arc::new(config),
                    llm,
                    memory,
                    settings,
                    session,
                    extractor,
                    summarizer,
                    bot_id: ready.user.id.get(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
