use super::guild_settings::GuildSettings;
use super::migration::MigrationPolicy;
use super::ready_gate::ReadyGate;
use super::settings_cache::{SettingsCache, SettingsStore};
use super::settings_models::{EntityRef, GuildHandle, Snowflake};
use crate::core::bus::ChangeNotifier;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything a settings facade needs from the running bot.
///
/// Built once in `main` and shared behind an `Arc`; facades are cheap views over it.
pub struct SettingsClient<S: SettingsStore> {
    pub guild_settings: SettingsCache<S>,
    pub user_settings: SettingsCache<S>,
    pub notifier: ChangeNotifier,
    pub ready: ReadyGate,
    pub migration_policy: MigrationPolicy,
}

impl<S: SettingsStore + 'static> SettingsClient<S> {
    pub fn new(
        guild_settings: SettingsCache<S>,
        user_settings: SettingsCache<S>,
        notifier: ChangeNotifier,
        migration_policy: MigrationPolicy,
    ) -> Self {
        Self {
            guild_settings,
            user_settings,
            notifier,
            ready: ReadyGate::new(),
            migration_policy,
        }
    }

    pub fn cluster_id(&self) -> u32 {
        self.notifier.cluster_id()
    }

    /// Build a guild facade for every guild still on the migration worklist.
    ///
    /// `resolve` looks the guild up in the gateway cache; guilds this cluster cannot
    /// see stay on the worklist. Returns the handles of the migrations that were scheduled.
    pub fn sweep_guild_migrations<F>(self: &Arc<Self>, resolve: F) -> Vec<JoinHandle<()>>
    where
        F: Fn(Snowflake) -> Option<Arc<dyn GuildHandle>>,
    {
        let pending = self.guild_settings.to_migrate();
        tracing::info!(pending = pending.len(), "Checking guilds for pending migrations");

        pending
            .into_iter()
            .filter_map(|id| {
                let guild = resolve(id)
                    .map(EntityRef::Resolved)
                    .unwrap_or(EntityRef::Id(id));
                GuildSettings::new(self, guild).take_migration()
            })
            .collect()
    }
}
