// Runtime configuration, read from the environment (and `.env`, loaded in main).

use crate::core::settings::MigrationPolicy;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub struct BotConfig {
    pub token: String,
    /// Identifies this process on the cluster bus.
    pub cluster_id: u32,
    /// Runtime databases live here so the repo root stays tidy.
    pub data_dir: PathBuf,
    pub migration_policy: MigrationPolicy,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("DISCORD_TOKEN").context(
            "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
        )?;

        let defaults = MigrationPolicy::default();
        let max_attempts = parse_or(&lookup, "MIGRATION_MAX_ATTEMPTS", defaults.max_attempts)?;
        let base_backoff = match lookup("MIGRATION_BACKOFF_SECS") {
            Some(raw) => Duration::from_secs(parse("MIGRATION_BACKOFF_SECS", &raw)?),
            None => defaults.base_backoff,
        };

        Ok(Self {
            token,
            cluster_id: parse_or(&lookup, "CLUSTER_ID", 0)?,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            migration_policy: MigrationPolicy {
                max_attempts,
                base_backoff,
            },
        })
    }

    pub fn settings_db_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => parse(key, &raw),
        None => Ok(default),
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
}
