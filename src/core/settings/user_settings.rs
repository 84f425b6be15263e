// Per-user view over the shared user settings cache.
//
// Every write is mirrored to the other clusters with a SETTINGS_SYNC event so
// their copies of the user cache stay current. The event always carries the value
// in effect here after the write, so a write the store rejected broadcasts the
// restored value rather than the rejected one.

use super::settings_cache::{SettingsError, SettingsStore};
use super::settings_client::SettingsClient;
use super::settings_models::{Snowflake, UserRef};
use crate::core::bus::{BusEvent, SettingsSync, SyncValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

pub struct UserSettings<S: SettingsStore + 'static> {
    client: Arc<SettingsClient<S>>,
    user: UserRef,
}

impl<S: SettingsStore + 'static> UserSettings<S> {
    /// Build the facade. Users have no pending migration, so this only takes the
    /// user off the migration worklist.
    pub fn new(client: &Arc<SettingsClient<S>>, user: impl Into<UserRef>) -> Self {
        let settings = Self {
            client: Arc::clone(client),
            user: user.into(),
        };

        if settings.should_migrate() {
            let task = settings.detached();
            tokio::spawn(async move {
                match task.run_migration().await {
                    Ok(()) => tracing::info!(
                        user_id = task.id(),
                        "[UserSettings] Migration complete for {}",
                        task.user.label()
                    ),
                    Err(e) => tracing::error!(user_id = task.id(), "User settings migration failed: {}", e),
                }
            });
        } else {
            settings.client.user_settings.prune_migration(settings.id());
        }

        settings
    }

    pub fn id(&self) -> Snowflake {
        self.user.id()
    }

    pub fn should_migrate(&self) -> bool {
        false
    }

    pub async fn run_migration(&self) -> Result<(), SettingsError> {
        Ok(())
    }

    fn detached(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            user: self.user.clone(),
        }
    }

    pub fn has(&self, option: &str) -> bool {
        self.client
            .user_settings
            .items()
            .get(&self.id())
            .is_some_and(|options| options.contains_key(option))
    }

    pub fn get_value(&self, option: &str) -> Option<Value> {
        self.client.user_settings.lookup(self.id(), option)
    }

    pub fn get<T: DeserializeOwned>(&self, option: &str, default: T) -> T {
        self.get_value(option)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }

    pub async fn set<T: Serialize>(&self, option: &str, value: T) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(user_id = self.id(), setting = option, "Refusing to store value: {}", e);
                return false;
            }
        };

        let stored = self
            .client
            .user_settings
            .set(self.id(), option, value.clone())
            .await;
        let sync = if stored {
            SyncValue::Value(value)
        } else {
            self.value_in_effect(option)
        };
        self.publish_sync(option, sync);
        stored
    }

    /// Remove an option. A missing option is reported as removed without touching
    /// the cache; the delete is still broadcast so stale copies elsewhere drop it.
    pub async fn delete(&self, option: &str) -> bool {
        let removed = if self.has(option) {
            self.client.user_settings.delete(self.id(), option).await
        } else {
            true
        };
        let sync = if removed {
            SyncValue::Deleted
        } else {
            self.value_in_effect(option)
        };
        self.publish_sync(option, sync);
        removed
    }

    fn value_in_effect(&self, option: &str) -> SyncValue {
        match self.get_value(option) {
            Some(value) => SyncValue::Value(value),
            None => SyncValue::Deleted,
        }
    }

    fn publish_sync(&self, option: &str, value: SyncValue) {
        self.client
            .notifier
            .publish(BusEvent::SettingsSync(SettingsSync {
                origin_id: self.client.cluster_id(),
                entity_id: self.id(),
                setting_key: option.to_string(),
                value,
            }));
    }
}
