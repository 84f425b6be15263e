// Discord commands module.
// Each feature gets its own command file.

use crate::core::settings::SettingsClient;
use crate::infra::settings::SqliteSettingsStore;
use std::sync::Arc;

pub mod settings;

/// Shared state handed to every command and event handler.
pub struct Data {
    pub settings: Arc<SettingsClient<SqliteSettingsStore>>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![settings::guildsetting(), settings::usersetting()]
}
