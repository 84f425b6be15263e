// This is the entry point of the Discord bot.
//
// **Architecture Overview:**
// - `core/` = Settings caches, facades and the cluster bus (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite, bus transport)
// - `discord/` = Discord-specific adapters (commands, events, cache adapters)
//
// This file's job is to:
// 1. Load configuration
// 2. Hydrate the settings caches and wire up the bus
// 3. Set up the Discord framework

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

mod config;

use crate::config::BotConfig;
use crate::core::bus::{ChangeNotifier, SettingsSyncHandler};
use crate::core::settings::{SettingsCache, SettingsClient};
use crate::discord::events as settings_events;
use crate::discord::{Data, Error};
use crate::infra::bus::ChannelTransport;
use crate::infra::settings::{sqlite_store, SettingsTable, SqliteSettingsStore};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::CacheReady { .. } => {
            settings_events::handle_cache_ready(ctx, data);
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            settings_events::handle_guild_create(ctx, data, guild);
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let pool = sqlite_store::connect(&config.settings_db_path()).await?;

    let guild_store = SqliteSettingsStore::new(pool.clone(), SettingsTable::Guild);
    guild_store.migrate().await?;
    let user_store = SqliteSettingsStore::new(pool, SettingsTable::User);
    user_store.migrate().await?;

    // Both caches must be hydrated before any facade is built.
    let guild_settings = SettingsCache::hydrate(guild_store).await?;
    let user_settings = SettingsCache::hydrate(user_store).await?;

    let settings = Arc::new(SettingsClient::new(
        guild_settings,
        user_settings,
        ChangeNotifier::new(config.cluster_id),
        config.migration_policy,
    ));

    // Single-process deployment: the bus loops straight back into our own sync
    // handler, which drops events this cluster published itself.
    let sync_handler = SettingsSyncHandler::new(Arc::clone(&settings));
    let (transport, mut frames) = ChannelTransport::new();
    tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = sync_handler.handle_frame(&frame) {
                tracing::warn!("Dropping bus frame: {}", e);
            }
        }
    });
    settings.notifier.attach(Arc::new(transport));
    tracing::info!(
        cluster_id = config.cluster_id,
        connected = settings.notifier.is_connected(),
        "Cluster bus attached"
    );

    let data = Data {
        settings: Arc::clone(&settings),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(cluster_id = data.settings.cluster_id(), "Commands registered");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .framework(framework)
        .await?;

    let result = client.start().await;

    // Nothing is listening once the gateway is gone.
    settings.notifier.detach();
    result?;
    Ok(())
}
