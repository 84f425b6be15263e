// Gateway events that drive the settings migrations.

use super::adapters::CachedGuild;
use crate::core::settings::{GuildHandle, GuildSettings};
use crate::discord::Data;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Every guild is cached: open the ready gate and migrate whatever is still pending.
pub fn handle_cache_ready(ctx: &serenity::Context, data: &Data) {
    data.settings.ready.mark_ready();

    let cache = Arc::clone(&ctx.cache);
    let scheduled = data
        .settings
        .sweep_guild_migrations(|id| CachedGuild::resolve(&cache, id));

    tracing::info!(scheduled = scheduled.len(), "Pending guild migrations scheduled");
}

/// A guild became available after startup (usually a new join).
///
/// Before the cache is ready the sweep covers every guild, so nothing happens here.
pub fn handle_guild_create(ctx: &serenity::Context, data: &Data, guild: &serenity::Guild) {
    if !data.settings.ready.is_ready() {
        return;
    }

    let handle: Arc<dyn GuildHandle> =
        Arc::new(CachedGuild::new(guild.id.get(), Arc::clone(&ctx.cache)));
    let settings = GuildSettings::new(&data.settings, handle);
    tracing::debug!(guild_id = settings.id(), "Checked guild settings on guild create");
}
