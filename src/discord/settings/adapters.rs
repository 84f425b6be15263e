// Adapters from serenity's cache types to the settings core's traits.

use crate::core::settings::{
    ChannelInfo, ChannelKind, Entity, GuildHandle, GuildProfile, Snowflake, UserProfile,
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// A guild read live from the gateway cache.
///
/// Holds the id and a cache handle rather than a copy of the guild, so channels
/// created after the facade was built are visible to its migration.
pub struct CachedGuild {
    id: Snowflake,
    cache: Arc<serenity::Cache>,
}

impl CachedGuild {
    pub fn new(id: Snowflake, cache: Arc<serenity::Cache>) -> Self {
        Self { id, cache }
    }

    /// A handle for `id`, if the cache knows the guild.
    pub fn resolve(cache: &Arc<serenity::Cache>, id: Snowflake) -> Option<Arc<dyn GuildHandle>> {
        if id == 0 {
            return None;
        }
        cache.guild(serenity::GuildId::new(id))?;
        Some(Arc::new(Self::new(id, Arc::clone(cache))))
    }

    fn guild_id(&self) -> serenity::GuildId {
        serenity::GuildId::new(self.id)
    }
}

impl Entity for CachedGuild {
    fn id(&self) -> Snowflake {
        self.id
    }

    fn label(&self) -> String {
        self.cache
            .guild(self.guild_id())
            .map(|guild| guild.name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

impl GuildHandle for CachedGuild {
    fn channels(&self) -> Vec<ChannelInfo> {
        let Some(guild) = self.cache.guild(self.guild_id()) else {
            return Vec::new();
        };

        guild
            .channels
            .values()
            .map(|channel| ChannelInfo {
                id: channel.id.get(),
                kind: channel_kind(channel.kind),
                parent_id: channel.parent_id.map(|parent| parent.get()),
            })
            .collect()
    }

    fn profile(&self) -> GuildProfile {
        let Some(guild) = self.cache.guild(self.guild_id()) else {
            return GuildProfile::default();
        };

        GuildProfile {
            name: guild.name.clone(),
            icon: guild.icon.as_ref().map(ToString::to_string),
            splash: guild.splash.as_ref().map(ToString::to_string),
            vanity: guild.vanity_url_code.clone(),
            member_count: guild.member_count,
            features: guild.features.clone(),
        }
    }
}

fn channel_kind(kind: serenity::ChannelType) -> ChannelKind {
    match kind {
        serenity::ChannelType::Text | serenity::ChannelType::News => ChannelKind::Text,
        serenity::ChannelType::Voice | serenity::ChannelType::Stage => ChannelKind::Voice,
        serenity::ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

impl From<&serenity::User> for UserProfile {
    fn from(user: &serenity::User) -> Self {
        UserProfile {
            id: user.id.get(),
            tag: user.tag(),
        }
    }
}
