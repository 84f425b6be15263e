// The process-wide settings cache.
//
// One cache exists per entity kind (guilds, users). It owns the in-memory copy of
// every stored option, writes through to a backing store, and keeps the worklist
// of entities whose stored schema still has to be checked for migrations.
//
// **Reads vs writes:**
// Reads never touch the store; once `hydrate` returns, memory is the source of
// truth for this process. Writes change memory first and then persist. If the
// store refuses, memory is put back, so once the write has finished reads return
// what was there before it.

use super::settings_models::{Snowflake, StoredSetting};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to persist setting {0}")]
    Persist(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Backing store behind a [`SettingsCache`].
///
/// The cache is authoritative for reads; the store only has to persist writes
/// and hand everything back on startup.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Every stored option for every entity.
    async fn load_all(&self) -> Result<Vec<StoredSetting>, SettingsError>;

    async fn upsert(&self, entity_id: Snowflake, key: &str, value: &Value)
        -> Result<(), SettingsError>;

    /// Returns whether a row was removed.
    async fn remove(&self, entity_id: Snowflake, key: &str) -> Result<bool, SettingsError>;
}

// ============================================================================
// CACHE
// ============================================================================

pub type OptionMap = HashMap<String, Value>;

pub struct SettingsCache<S: SettingsStore> {
    store: S,
    items: DashMap<Snowflake, OptionMap>,
    /// Ordered, duplicate free.
    to_migrate: Mutex<Vec<Snowflake>>,
    migration_failures: DashMap<Snowflake, u32>,
    /// Attempts scheduled but not finished yet.
    migrations_in_flight: DashMap<Snowflake, u32>,
}

impl<S: SettingsStore> SettingsCache<S> {
    /// Load every stored option into memory.
    ///
    /// This is the only constructor: `has` answers from memory alone, so a cache
    /// that has not been hydrated must never be handed to a facade.
    /// Every loaded entity starts out on the migration worklist.
    pub async fn hydrate(store: S) -> Result<Self, SettingsError> {
        let rows = store.load_all().await?;

        let items: DashMap<Snowflake, OptionMap> = DashMap::new();
        let mut to_migrate = Vec::new();
        for row in rows {
            if !items.contains_key(&row.entity_id) {
                to_migrate.push(row.entity_id);
            }
            items
                .entry(row.entity_id)
                .or_default()
                .insert(row.key, row.value);
        }

        tracing::info!(
            entities = items.len(),
            pending_migration = to_migrate.len(),
            "Settings cache hydrated"
        );

        Ok(Self {
            store,
            items,
            to_migrate: Mutex::new(to_migrate),
            migration_failures: DashMap::new(),
            migrations_in_flight: DashMap::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Raw access to the cached options. Facades answer `has` from this directly.
    pub fn items(&self) -> &DashMap<Snowflake, OptionMap> {
        &self.items
    }

    /// Stored value, or `default` when the entity or key is unknown.
    pub fn get(&self, entity_id: Snowflake, key: &str, default: Value) -> Value {
        self.lookup(entity_id, key).unwrap_or(default)
    }

    pub fn lookup(&self, entity_id: Snowflake, key: &str) -> Option<Value> {
        self.items
            .get(&entity_id)
            .and_then(|options| options.get(key).cloned())
    }

    /// Upsert a value and persist it. Returns `false` if the store rejected the write,
    /// in which case the previous in-memory value is restored unless another write
    /// replaced ours in the meantime.
    pub async fn set(&self, entity_id: Snowflake, key: &str, value: Value) -> bool {
        let previous = self
            .items
            .entry(entity_id)
            .or_default()
            .insert(key.to_string(), value.clone());

        match self.store.upsert(entity_id, key, &value).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(entity_id, setting = key, "Failed to persist setting: {}", e);
                self.restore(entity_id, key, Some(&value), previous);
                false
            }
        }
    }

    /// Remove a value. Returns whether anything was removed.
    pub async fn delete(&self, entity_id: Snowflake, key: &str) -> bool {
        let previous = self
            .items
            .get_mut(&entity_id)
            .and_then(|mut options| options.remove(key));

        let Some(previous) = previous else {
            return false;
        };

        match self.store.remove(entity_id, key).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(entity_id, setting = key, "Failed to delete setting: {}", e);
                self.restore(entity_id, key, None, Some(previous));
                false
            }
        }
    }

    /// Undo a failed write, but only while the slot still holds what that write left
    /// there (`written`, or nothing for a delete).
    fn restore(
        &self,
        entity_id: Snowflake,
        key: &str,
        written: Option<&Value>,
        previous: Option<Value>,
    ) {
        let mut options = self.items.entry(entity_id).or_default();
        if options.get(key) != written {
            return;
        }
        match previous {
            Some(value) => {
                options.insert(key.to_string(), value);
            }
            None => {
                options.remove(key);
            }
        }
    }

    /// Apply a change another cluster already persisted. Memory only.
    pub fn apply_remote(&self, entity_id: Snowflake, key: &str, value: Value) {
        self.items
            .entry(entity_id)
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Drop a value another cluster already deleted. Memory only.
    pub fn evict_remote(&self, entity_id: Snowflake, key: &str) {
        if let Some(mut options) = self.items.get_mut(&entity_id) {
            options.remove(key);
        }
    }

    // ------------------------------------------------------------------------
    // Migration bookkeeping
    // ------------------------------------------------------------------------

    pub fn to_migrate(&self) -> Vec<Snowflake> {
        self.to_migrate
            .lock()
            .map(|pending| pending.clone())
            .unwrap_or_default()
    }

    /// Remove an entity from the worklist. No-op if it is not there.
    pub fn prune_migration(&self, entity_id: Snowflake) {
        if let Ok(mut pending) = self.to_migrate.lock() {
            pending.retain(|id| *id != entity_id);
        }
    }

    pub fn migration_attempts(&self, entity_id: Snowflake) -> u32 {
        self.migration_failures
            .get(&entity_id)
            .map(|attempts| *attempts)
            .unwrap_or(0)
    }

    /// Claim a migration attempt. `allows` sees the failures so far plus the attempts
    /// still running; on success the prior failure count is returned and the attempt
    /// stays claimed until [`SettingsCache::end_migration_attempt`].
    pub fn begin_migration_attempt(
        &self,
        entity_id: Snowflake,
        allows: impl Fn(u32) -> bool,
    ) -> Option<u32> {
        let failures = self.migration_attempts(entity_id);
        let mut in_flight = self.migrations_in_flight.entry(entity_id).or_insert(0);
        if !allows(failures + *in_flight) {
            return None;
        }
        *in_flight += 1;
        Some(failures)
    }

    pub fn end_migration_attempt(&self, entity_id: Snowflake) {
        self.migrations_in_flight
            .remove_if_mut(&entity_id, |_, in_flight| {
                *in_flight = in_flight.saturating_sub(1);
                *in_flight == 0
            });
    }

    pub fn migrations_in_flight(&self, entity_id: Snowflake) -> u32 {
        self.migrations_in_flight
            .get(&entity_id)
            .map(|in_flight| *in_flight)
            .unwrap_or(0)
    }

    /// Count a failed migration attempt and return the new total.
    pub fn record_migration_failure(&self, entity_id: Snowflake) -> u32 {
        let mut attempts = self.migration_failures.entry(entity_id).or_insert(0);
        *attempts += 1;
        *attempts
    }

    pub fn clear_migration_failures(&self, entity_id: Snowflake) {
        self.migration_failures.remove(&entity_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::settings::InMemorySettingsStore;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Notify;

    /// Store that accepts reads and refuses every write.
    struct ReadOnlyStore;

    #[async_trait]
    impl SettingsStore for ReadOnlyStore {
        async fn load_all(&self) -> Result<Vec<StoredSetting>, SettingsError> {
            Ok(vec![StoredSetting {
                entity_id: 1,
                key: "utils.public".to_string(),
                value: json!(true),
            }])
        }

        async fn upsert(&self, _: Snowflake, _: &str, _: &Value) -> Result<(), SettingsError> {
            Err(SettingsError::Storage("read only".to_string()))
        }

        async fn remove(&self, _: Snowflake, _: &str) -> Result<bool, SettingsError> {
            Err(SettingsError::Storage("read only".to_string()))
        }
    }

    /// Store whose writes of `"slow"` wait for a signal and then fail.
    struct GatedStore {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl SettingsStore for GatedStore {
        async fn load_all(&self) -> Result<Vec<StoredSetting>, SettingsError> {
            Ok(Vec::new())
        }

        async fn upsert(&self, _: Snowflake, _: &str, value: &Value) -> Result<(), SettingsError> {
            if value == &json!("slow") {
                self.release.notified().await;
                return Err(SettingsError::Storage("timed out".to_string()));
            }
            Ok(())
        }

        async fn remove(&self, _: Snowflake, _: &str) -> Result<bool, SettingsError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn hydrate_loads_rows_and_seeds_the_worklist_in_order() {
        let store = InMemorySettingsStore::with_rows(vec![
            StoredSetting {
                entity_id: 20,
                key: "a".to_string(),
                value: json!(1),
            },
            StoredSetting {
                entity_id: 10,
                key: "b".to_string(),
                value: json!("x"),
            },
            StoredSetting {
                entity_id: 20,
                key: "c".to_string(),
                value: json!([]),
            },
        ]);

        let cache = SettingsCache::hydrate(store).await.unwrap();

        assert_eq!(cache.to_migrate(), vec![20, 10]);
        assert_eq!(cache.get(20, "a", Value::Null), json!(1));
        assert_eq!(cache.get(10, "b", Value::Null), json!("x"));
        assert_eq!(cache.items().get(&20).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn get_falls_back_to_default_for_unknown_entities_and_keys() {
        let cache = SettingsCache::hydrate(InMemorySettingsStore::new())
            .await
            .unwrap();

        assert_eq!(cache.get(99, "missing", json!("fallback")), json!("fallback"));
        cache.set(99, "present", json!(5)).await;
        assert_eq!(cache.get(99, "missing", json!(0)), json!(0));
    }

    #[tokio::test]
    async fn set_and_delete_write_through_to_the_store() {
        let store = InMemorySettingsStore::new();
        let cache = SettingsCache::hydrate(store.clone()).await.unwrap();

        assert!(cache.set(5, "utils.featured", json!(true)).await);
        assert_eq!(store.value(5, "utils.featured"), Some(json!(true)));

        assert!(cache.delete(5, "utils.featured").await);
        assert_eq!(store.value(5, "utils.featured"), None);
        assert!(!cache.delete(5, "utils.featured").await);
    }

    #[tokio::test]
    async fn failed_writes_restore_the_previous_value() {
        let cache = SettingsCache::hydrate(ReadOnlyStore).await.unwrap();

        assert!(!cache.set(1, "utils.public", json!(false)).await);
        assert_eq!(cache.get(1, "utils.public", Value::Null), json!(true));

        assert!(!cache.set(1, "brand.new", json!(1)).await);
        assert!(!cache.items().get(&1).unwrap().contains_key("brand.new"));

        assert!(!cache.delete(1, "utils.public").await);
        assert_eq!(cache.get(1, "utils.public", Value::Null), json!(true));
    }

    #[tokio::test]
    async fn remote_changes_only_touch_memory() {
        let store = InMemorySettingsStore::new();
        let cache = SettingsCache::hydrate(store.clone()).await.unwrap();

        cache.apply_remote(3, "x", json!("remote"));
        assert_eq!(cache.get(3, "x", Value::Null), json!("remote"));
        assert_eq!(store.value(3, "x"), None);

        cache.evict_remote(3, "x");
        assert_eq!(cache.get(3, "x", Value::Null), Value::Null);
        cache.evict_remote(404, "x");
    }

    #[tokio::test]
    async fn worklist_pruning_is_idempotent() {
        let store = InMemorySettingsStore::with_rows(vec![
            StoredSetting {
                entity_id: 1,
                key: "k".to_string(),
                value: json!(1),
            },
            StoredSetting {
                entity_id: 2,
                key: "k".to_string(),
                value: json!(1),
            },
        ]);
        let cache = SettingsCache::hydrate(store).await.unwrap();

        cache.prune_migration(1);
        cache.prune_migration(1);
        cache.prune_migration(3);
        assert_eq!(cache.to_migrate(), vec![2]);
    }

    #[tokio::test]
    async fn a_failed_write_does_not_undo_a_later_successful_one() {
        let release = Arc::new(Notify::new());
        let cache = Arc::new(
            SettingsCache::hydrate(GatedStore {
                release: Arc::clone(&release),
            })
            .await
            .unwrap(),
        );

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.set(1, "k", json!("slow")).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(cache.lookup(1, "k"), Some(json!("slow")));

        assert!(cache.set(1, "k", json!("fast")).await);
        release.notify_one();

        assert!(!slow.await.unwrap());
        assert_eq!(cache.lookup(1, "k"), Some(json!("fast")));
    }

    #[tokio::test]
    async fn in_flight_migrations_count_against_the_cap() {
        let cache = SettingsCache::hydrate(InMemorySettingsStore::new())
            .await
            .unwrap();
        let below_two = |attempts: u32| attempts < 2;

        assert_eq!(cache.begin_migration_attempt(1, below_two), Some(0));
        assert_eq!(cache.begin_migration_attempt(1, below_two), Some(0));
        assert_eq!(cache.begin_migration_attempt(1, below_two), None);
        assert_eq!(cache.migrations_in_flight(1), 2);

        cache.record_migration_failure(1);
        cache.end_migration_attempt(1);
        assert_eq!(cache.begin_migration_attempt(1, below_two), None);

        cache.end_migration_attempt(1);
        assert_eq!(cache.migrations_in_flight(1), 0);
        assert_eq!(cache.begin_migration_attempt(1, below_two), Some(1));
    }

    #[tokio::test]
    async fn migration_failures_are_counted_per_entity() {
        let cache = SettingsCache::hydrate(InMemorySettingsStore::new())
            .await
            .unwrap();

        assert_eq!(cache.migration_attempts(1), 0);
        assert_eq!(cache.record_migration_failure(1), 1);
        assert_eq!(cache.record_migration_failure(1), 2);
        assert_eq!(cache.migration_attempts(2), 0);

        cache.clear_migration_failures(1);
        assert_eq!(cache.migration_attempts(1), 0);
    }
}
