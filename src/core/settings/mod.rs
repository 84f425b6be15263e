// Per-guild and per-user settings: the shared caches, the facades built on top
// of them, and the stored-schema migrations.

pub mod guild_settings;
pub mod migration;
pub mod ready_gate;
pub mod settings_cache;
pub mod settings_client;
pub mod settings_models;
pub mod user_settings;

#[cfg(test)]
pub mod test_support;

pub use guild_settings::GuildSettings;
pub use migration::MigrationPolicy;
pub use settings_cache::{SettingsCache, SettingsError, SettingsStore};
pub use settings_client::SettingsClient;
pub use settings_models::{
    ChannelInfo, ChannelKind, DiscoverableGuild, Entity, GuildHandle, GuildProfile, Snowflake,
    StoredSetting, UserProfile,
};
pub use user_settings::UserSettings;
