// This is the infra layer - it implements the SettingsStore trait from core.
//
// **Layout:**
// One table per entity kind (`guild_settings`, `user_settings`), one row per
// (entity, key). Values are stored as JSON text, so any shape a facade writes
// comes back unchanged. `load_all` returns rows in insertion order (`rowid`),
// which is the order the migration worklist is seeded in.

use crate::core::settings::{SettingsError, SettingsStore, Snowflake, StoredSetting};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::types::Json;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// Which entity kind a store persists. Each kind gets its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsTable {
    Guild,
    User,
}

impl SettingsTable {
    fn name(self) -> &'static str {
        match self {
            SettingsTable::Guild => "guild_settings",
            SettingsTable::User => "user_settings",
        }
    }
}

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
    table: SettingsTable,
}

/// Open (creating if needed) the settings database at `path`.
pub async fn connect(path: &Path) -> anyhow::Result<Pool<Sqlite>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await?;
    Ok(pool)
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<Sqlite>, table: SettingsTable) -> Self {
        Self { pool, table }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                entity_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (entity_id, key)
            );
            "#,
            self.table.name()
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn storage_error(e: sqlx::Error) -> SettingsError {
    SettingsError::Storage(e.to_string())
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load_all(&self) -> Result<Vec<StoredSetting>, SettingsError> {
        let rows = sqlx::query(&format!(
            "SELECT entity_id, key, value FROM {} ORDER BY rowid",
            self.table.name()
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut settings = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(value) = row
                .try_get::<Json<Value>, _>("value")
                .map_err(storage_error)?;
            settings.push(StoredSetting {
                entity_id: row.get::<i64, _>("entity_id") as u64,
                key: row.get("key"),
                value,
            });
        }
        Ok(settings)
    }

    async fn upsert(
        &self,
        entity_id: Snowflake,
        key: &str,
        value: &Value,
    ) -> Result<(), SettingsError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (entity_id, key, value)
            VALUES (?, ?, ?)
            ON CONFLICT(entity_id, key) DO UPDATE SET
                value = excluded.value
            "#,
            self.table.name()
        ))
        .bind(entity_id as i64)
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn remove(&self, entity_id: Snowflake, key: &str) -> Result<bool, SettingsError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE entity_id = ? AND key = ?",
            self.table.name()
        ))
        .bind(entity_id as i64)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(result.rows_affected() > 0)
    }
}
