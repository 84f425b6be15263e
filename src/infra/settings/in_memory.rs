// This file provides an IN-MEMORY implementation of SettingsStore.
//
// **Where it is used:**
// Only by the tests. It stands in for SQLite so the cache and facade tests run
// without a database, and its read-only switch lets them exercise the rollback
// paths that a healthy SQLite file never hits.

use crate::core::settings::{SettingsError, SettingsStore, Snowflake, StoredSetting};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct SettingKey {
    entity_id: Snowflake,
    key: String,
}

#[derive(Clone, Debug)]
struct StoredValue {
    /// Insertion order, so `load_all` hands rows back the way they went in.
    seq: u64,
    value: Value,
}

/// Clones share the same rows.
#[derive(Clone, Default)]
pub struct InMemorySettingsStore {
    data: Arc<DashMap<SettingKey, StoredValue>>,
    next_seq: Arc<AtomicU64>,
    read_only: Arc<AtomicBool>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<StoredSetting>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert(row.entity_id, &row.key, row.value);
        }
        store
    }

    /// Make every write fail with a storage error.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn value(&self, entity_id: Snowflake, key: &str) -> Option<Value> {
        self.data
            .get(&SettingKey {
                entity_id,
                key: key.to_string(),
            })
            .map(|entry| entry.value.clone())
    }

    fn insert(&self, entity_id: Snowflake, key: &str, value: Value) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.data
            .entry(SettingKey {
                entity_id,
                key: key.to_string(),
            })
            .and_modify(|stored| stored.value = value.clone())
            .or_insert(StoredValue { seq, value });
    }

    fn check_writable(&self) -> Result<(), SettingsError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(SettingsError::Storage("store is read only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load_all(&self) -> Result<Vec<StoredSetting>, SettingsError> {
        let mut rows: Vec<(u64, StoredSetting)> = self
            .data
            .iter()
            .map(|entry| {
                (
                    entry.value().seq,
                    StoredSetting {
                        entity_id: entry.key().entity_id,
                        key: entry.key().key.clone(),
                        value: entry.value().value.clone(),
                    },
                )
            })
            .collect();

        rows.sort_by_key(|(seq, _)| *seq);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn upsert(
        &self,
        entity_id: Snowflake,
        key: &str,
        value: &Value,
    ) -> Result<(), SettingsError> {
        self.check_writable()?;
        self.insert(entity_id, key, value.clone());
        Ok(())
    }

    async fn remove(&self, entity_id: Snowflake, key: &str) -> Result<bool, SettingsError> {
        self.check_writable()?;
        Ok(self
            .data
            .remove(&SettingKey {
                entity_id,
                key: key.to_string(),
            })
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn rows_come_back_in_insertion_order() {
        let store = InMemorySettingsStore::new();
        store.upsert(3, "a", &json!(1)).await.unwrap();
        store.upsert(1, "b", &json!(2)).await.unwrap();
        store.upsert(3, "a", &json!(5)).await.unwrap();

        let rows = store.load_all().await.unwrap();
        let ids: Vec<Snowflake> = rows.iter().map(|row| row.entity_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(rows[0].value, json!(5));
    }

    #[tokio::test]
    async fn read_only_stores_reject_writes() {
        let store = InMemorySettingsStore::with_rows(vec![StoredSetting {
            entity_id: 1,
            key: "k".to_string(),
            value: json!(true),
        }]);
        store.clone().set_read_only(true);

        assert!(store.upsert(1, "k", &json!(false)).await.is_err());
        assert!(store.remove(1, "k").await.is_err());
        assert_eq!(store.value(1, "k"), Some(json!(true)));

        store.set_read_only(false);
        assert!(store.remove(1, "k").await.unwrap());
        assert!(!store.remove(1, "k").await.unwrap());
    }
}
