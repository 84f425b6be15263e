// Slash commands for reading and writing raw settings.
//
// **Notice the pattern:**
// 1. Build a facade for the guild or the invoking user
// 2. Call it with the key and a parsed value
// 3. Reply based on whether the store accepted the write
//
// Values are typed as JSON (`true`, `5`, `["1", "2"]`); anything that does not
// parse is stored as a plain string. Discovery updates and cross-cluster sync
// happen inside the facades, so nothing here talks to the bus.

use crate::core::settings::{GuildSettings, UserProfile, UserSettings};
use crate::discord::adapters::CachedGuild;
use crate::discord::{Context, Error};
use crate::infra::settings::SqliteSettingsStore;
use serde_json::Value;

/// Manage this server's settings.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    subcommands("guild_get", "guild_set", "guild_delete")
)]
pub async fn guildsetting(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show a server setting.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    rename = "get"
)]
pub async fn guild_get(
    ctx: Context<'_>,
    #[description = "Setting key, e.g. utils.public"] key: String,
) -> Result<(), Error> {
    let settings = guild_facade(ctx)?;
    ctx.say(describe(&key, settings.get_value(&key))).await?;
    Ok(())
}

/// Change a server setting.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    rename = "set"
)]
pub async fn guild_set(
    ctx: Context<'_>,
    #[description = "Setting key"] key: String,
    #[description = "New value (JSON or plain text)"] value: String,
) -> Result<(), Error> {
    let settings = guild_facade(ctx)?;
    let value = parse_value(&value);

    if settings.set(&key, &value).await {
        ctx.say(format!("✅ `{}` set to `{}`.", key, value)).await?;
    } else {
        ctx.say(format!("❌ Could not save `{}`, try again later.", key))
            .await?;
    }
    Ok(())
}

/// Reset a server setting to its default.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    rename = "delete"
)]
pub async fn guild_delete(
    ctx: Context<'_>,
    #[description = "Setting key"] key: String,
) -> Result<(), Error> {
    let settings = guild_facade(ctx)?;

    if settings.delete(&key).await {
        ctx.say(format!("🗑️ `{}` reset.", key)).await?;
    } else {
        ctx.say(format!("❌ Could not reset `{}`, try again later.", key))
            .await?;
    }
    Ok(())
}

/// Manage your personal settings.
#[poise::command(slash_command, subcommands("user_get", "user_set", "user_delete"))]
pub async fn usersetting(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show one of your settings.
#[poise::command(slash_command, ephemeral, rename = "get")]
pub async fn user_get(
    ctx: Context<'_>,
    #[description = "Setting key"] key: String,
) -> Result<(), Error> {
    let settings = user_facade(ctx);
    let value: Value = settings.get(&key, Value::Null);
    ctx.say(describe(&key, Some(value).filter(|v| !v.is_null())))
        .await?;
    Ok(())
}

/// Change one of your settings.
#[poise::command(slash_command, ephemeral, rename = "set")]
pub async fn user_set(
    ctx: Context<'_>,
    #[description = "Setting key"] key: String,
    #[description = "New value (JSON or plain text)"] value: String,
) -> Result<(), Error> {
    let settings = user_facade(ctx);
    let value = parse_value(&value);

    if settings.set(&key, &value).await {
        ctx.say(format!("✅ `{}` set to `{}`.", key, value)).await?;
    } else {
        ctx.say(format!("❌ Could not save `{}`, try again later.", key))
            .await?;
    }
    Ok(())
}

/// Reset one of your settings.
#[poise::command(slash_command, ephemeral, rename = "delete")]
pub async fn user_delete(
    ctx: Context<'_>,
    #[description = "Setting key"] key: String,
) -> Result<(), Error> {
    let settings = user_facade(ctx);

    if settings.delete(&key).await {
        ctx.say(format!("🗑️ `{}` reset.", key)).await?;
    } else {
        ctx.say(format!("❌ Could not reset `{}`, try again later.", key))
            .await?;
    }
    Ok(())
}

fn guild_facade(ctx: Context<'_>) -> Result<GuildSettings<SqliteSettingsStore>, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let cache = &ctx.serenity_context().cache;

    let settings = match CachedGuild::resolve(cache, guild_id) {
        Some(guild) => GuildSettings::new(&ctx.data().settings, guild),
        None => GuildSettings::new(&ctx.data().settings, guild_id),
    };
    Ok(settings)
}

fn user_facade(ctx: Context<'_>) -> UserSettings<SqliteSettingsStore> {
    UserSettings::new(&ctx.data().settings, UserProfile::from(ctx.author()))
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn describe(key: &str, value: Option<Value>) -> String {
    match value {
        Some(value) => format!("`{}` = `{}`", key, value),
        None => format!("`{}` is not set.", key),
    }
}
