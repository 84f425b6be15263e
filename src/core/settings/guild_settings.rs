// Per-guild view over the shared guild settings cache.
//
// A `GuildSettings` is built on demand for one request and thrown away afterwards.
// Building one is also what triggers the stored-schema migration check for that guild.

use super::migration::{coalesce_categories, RESTRICT_COMMAND_MIGRATION};
use super::settings_cache::{SettingsError, SettingsStore};
use super::settings_client::SettingsClient;
use super::settings_models::{
    migration_marker, snowflake_list, snowflake_list_value, DiscoverableGuild, GuildHandle,
    GuildRef, Snowflake, ADMIN_ONLY, DISCOVERABLE_FEATURE, FEATURED, MOD_ONLY, PUBLIC,
};
use crate::core::bus::{BusEvent, DiscoveryUpdate, DiscoveryUpdateOp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct GuildSettings<S: SettingsStore + 'static> {
    client: Arc<SettingsClient<S>>,
    guild: GuildRef,
    migration: Option<JoinHandle<()>>,
}

impl<S: SettingsStore + 'static> GuildSettings<S> {
    /// Build the facade and run the migration check.
    ///
    /// Returns immediately. If the guild still has legacy data and has not been
    /// migrated, the migration runs in the background once the gateway is ready;
    /// otherwise the guild is taken off the migration worklist.
    ///
    /// Nothing stops two facades for the same guild from both scheduling the
    /// migration before either finishes. The migration is idempotent, so the
    /// second run rewrites the same lists.
    pub fn new(client: &Arc<SettingsClient<S>>, guild: impl Into<GuildRef>) -> Self {
        let mut settings = Self {
            client: Arc::clone(client),
            guild: guild.into(),
            migration: None,
        };

        let migrated = settings.get(&migration_marker(settings.migration_id()), false);
        if settings.should_migrate() && !migrated {
            settings.migration = settings.schedule_migration();
        } else {
            settings.client.guild_settings.prune_migration(settings.id());
        }

        settings
    }

    pub fn id(&self) -> Snowflake {
        self.guild.id()
    }

    /// Handle of the migration scheduled by [`GuildSettings::new`], if any.
    pub fn take_migration(&mut self) -> Option<JoinHandle<()>> {
        self.migration.take()
    }

    // ========================================================================
    // MIGRATION
    // ========================================================================

    /// Whether the guild still stores per-channel command restrictions.
    ///
    /// Any non-empty list counts, even one holding only ids that no longer parse;
    /// the migration drops those.
    pub fn should_migrate(&self) -> bool {
        let restricted = |key| {
            self.get_value(key)
                .and_then(|value| value.as_array().map(|ids| !ids.is_empty()))
                .unwrap_or(false)
        };
        restricted(MOD_ONLY) || restricted(ADMIN_ONLY)
    }

    pub fn migration_id(&self) -> &'static str {
        RESTRICT_COMMAND_MIGRATION
    }

    /// Rewrite both restriction lists against the guild's current channels.
    ///
    /// Does nothing for a bare id since there are no channels to compare against.
    pub async fn run_migration(&self) -> Result<(), SettingsError> {
        let Some(guild) = self.guild.resolved() else {
            return Ok(());
        };
        let channels = guild.channels();

        for key in [ADMIN_ONLY, MOD_ONLY] {
            let current = self
                .get_value(key)
                .map(|value| snowflake_list(&value))
                .unwrap_or_default();
            let migrated = coalesce_categories(&current, &channels);

            if !self.set(key, snowflake_list_value(&migrated)).await {
                return Err(SettingsError::Persist(key.to_string()));
            }
        }

        Ok(())
    }

    fn schedule_migration(&self) -> Option<JoinHandle<()>> {
        let guild_id = self.id();
        let cache = &self.client.guild_settings;

        if self.guild.resolved().is_none() {
            tracing::debug!(guild_id, "Guild not resolved, deferring settings migration");
            return None;
        }

        let policy = self.client.migration_policy;
        let Some(failures) =
            cache.begin_migration_attempt(guild_id, |attempts| policy.allows_attempt(attempts))
        else {
            tracing::warn!(
                guild_id,
                failures = cache.migration_attempts(guild_id),
                in_flight = cache.migrations_in_flight(guild_id),
                migration = self.migration_id(),
                "Settings migration attempts exhausted, not scheduling another"
            );
            return None;
        };

        let task = self.detached();
        Some(tokio::spawn(async move {
            task.client.ready.wait_until_ready().await;

            let delay = policy.backoff(failures);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            task.complete_migration().await;
            task.client.guild_settings.end_migration_attempt(task.id());
        }))
    }

    async fn complete_migration(&self) {
        let guild_id = self.id();
        let cache = &self.client.guild_settings;

        let result = match self.run_migration().await {
            Ok(()) => {
                let marker = migration_marker(self.migration_id());
                if self.set(&marker, true).await {
                    Ok(())
                } else {
                    Err(SettingsError::Persist(marker))
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                cache.clear_migration_failures(guild_id);
                cache.prune_migration(guild_id);
                tracing::info!(
                    guild_id,
                    migration = self.migration_id(),
                    "[GuildSettings] Migration complete for {}",
                    self.guild.label()
                );
            }
            Err(e) => {
                let failures = cache.record_migration_failure(guild_id);
                tracing::error!(
                    guild_id,
                    failures,
                    migration = self.migration_id(),
                    "Settings migration failed: {}",
                    e
                );
            }
        }
    }

    /// Copy of this facade without the migration handle, for the background task.
    fn detached(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            guild: self.guild.clone(),
            migration: None,
        }
    }

    // ========================================================================
    // OPTIONS
    // ========================================================================

    /// Whether the option is stored for this guild. Answers from the cache alone.
    pub fn has(&self, option: &str) -> bool {
        self.client
            .guild_settings
            .items()
            .get(&self.id())
            .is_some_and(|options| options.contains_key(option))
    }

    pub fn get_value(&self, option: &str) -> Option<Value> {
        self.client.guild_settings.lookup(self.id(), option)
    }

    /// Stored value, or `default` if the option is unset or has a different shape.
    pub fn get<T: DeserializeOwned>(&self, option: &str, default: T) -> T {
        let value = self.client.guild_settings.get(self.id(), option, Value::Null);
        if value.is_null() {
            return default;
        }

        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!(guild_id = self.id(), setting = option, "Unexpected setting shape: {}", e);
            default
        })
    }

    /// Store a value. Changing `utils.featured` or `utils.public` on a resolved
    /// guild also tells the discovery directory about it.
    pub async fn set<T: Serialize>(&self, option: &str, value: T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(guild_id = self.id(), setting = option, "Refusing to store value: {}", e);
                return false;
            }
        };

        let stored = self.client.guild_settings.set(self.id(), option, value).await;

        match option {
            FEATURED => self.publish_discovery(DiscoveryUpdateOp::Sync),
            PUBLIC => {
                let op = if self.is_public() {
                    DiscoveryUpdateOp::AddOrSync
                } else {
                    DiscoveryUpdateOp::Remove
                };
                self.publish_discovery(op);
            }
            _ => {}
        }

        stored
    }

    /// Remove an option. Deleting something that is not stored counts as success.
    pub async fn delete(&self, option: &str) -> bool {
        if !self.has(option) {
            return true;
        }
        self.client.guild_settings.delete(self.id(), option).await
    }

    // ========================================================================
    // DISCOVERY
    // ========================================================================

    /// Listed in the public directory: opted in through `utils.public`, or
    /// the guild is discoverable on Discord itself.
    pub fn is_public(&self) -> bool {
        let discoverable = self.guild.resolved().is_some_and(|guild| {
            guild
                .profile()
                .features
                .iter()
                .any(|feature| feature == DISCOVERABLE_FEATURE)
        });
        self.get(PUBLIC, false) || discoverable
    }

    pub fn discoverable_data(&self) -> Option<DiscoverableGuild> {
        self.guild
            .resolved()
            .map(|guild| self.snapshot(guild.as_ref()))
    }

    fn snapshot(&self, guild: &dyn GuildHandle) -> DiscoverableGuild {
        let profile = guild.profile();
        DiscoverableGuild {
            id: self.id().to_string(),
            name: profile.name,
            icon: profile.icon,
            splash: profile.splash,
            vanity: profile.vanity,
            members: profile.member_count,
            featured: self.get(FEATURED, false),
            cluster: self.client.cluster_id(),
        }
    }

    /// Bare ids have nothing to list, so they publish nothing.
    fn publish_discovery(&self, op: DiscoveryUpdateOp) {
        let Some(snapshot) = self.discoverable_data() else {
            return;
        };
        self.client
            .notifier
            .publish(BusEvent::DiscoveryUpdate(DiscoveryUpdate {
                op,
                guilds: vec![snapshot],
            }));
    }
}
