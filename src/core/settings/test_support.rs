// Fixtures shared by the settings tests.

use super::migration::MigrationPolicy;
use super::settings_cache::SettingsCache;
use super::settings_client::SettingsClient;
use super::settings_models::{
    ChannelInfo, ChannelKind, Entity, GuildHandle, GuildProfile, Snowflake, StoredSetting,
};
use crate::core::bus::bus_models::{decode, BusEvent};
use crate::core::bus::ChangeNotifier;
use crate::infra::bus::ChannelTransport;
use crate::infra::settings::InMemorySettingsStore;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;

pub const TEST_CLUSTER: u32 = 4;

/// A guild whose channel list can change after the facade is built.
pub struct FakeGuild {
    id: Snowflake,
    name: String,
    channels: Mutex<Vec<ChannelInfo>>,
    features: Vec<String>,
}

impl FakeGuild {
    pub fn new(id: Snowflake, name: &str, channels: Vec<ChannelInfo>) -> Self {
        Self {
            id,
            name: name.to_string(),
            channels: Mutex::new(channels),
            features: Vec::new(),
        }
    }

    pub fn with_features(mut self, features: &[&str]) -> Self {
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn set_channels(&self, channels: Vec<ChannelInfo>) {
        *self.channels.lock().unwrap() = channels;
    }
}

impl Entity for FakeGuild {
    fn id(&self) -> Snowflake {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl GuildHandle for FakeGuild {
    fn channels(&self) -> Vec<ChannelInfo> {
        self.channels.lock().unwrap().clone()
    }

    fn profile(&self) -> GuildProfile {
        GuildProfile {
            name: self.name.clone(),
            member_count: 3,
            features: self.features.clone(),
            ..Default::default()
        }
    }
}

pub fn category(id: Snowflake) -> ChannelInfo {
    ChannelInfo {
        id,
        kind: ChannelKind::Category,
        parent_id: None,
    }
}

pub fn text_channel(id: Snowflake, parent_id: Option<Snowflake>) -> ChannelInfo {
    ChannelInfo {
        id,
        kind: ChannelKind::Text,
        parent_id,
    }
}

/// A stored row, tagged with the cache it belongs to.
pub enum SeedRow {
    Guild(StoredSetting),
    User(StoredSetting),
}

pub fn guild_row(entity_id: Snowflake, key: &str, value: Value) -> SeedRow {
    SeedRow::Guild(StoredSetting {
        entity_id,
        key: key.to_string(),
        value,
    })
}

pub fn user_row(entity_id: Snowflake, key: &str, value: Value) -> SeedRow {
    SeedRow::User(StoredSetting {
        entity_id,
        key: key.to_string(),
        value,
    })
}

/// A hydrated client over in-memory stores, publishing into the returned receiver.
pub async fn client_with(
    rows: Vec<SeedRow>,
    policy: MigrationPolicy,
) -> (
    Arc<SettingsClient<InMemorySettingsStore>>,
    UnboundedReceiver<Vec<u8>>,
) {
    let mut guild_rows = Vec::new();
    let mut user_rows = Vec::new();
    for row in rows {
        match row {
            SeedRow::Guild(row) => guild_rows.push(row),
            SeedRow::User(row) => user_rows.push(row),
        }
    }

    let guild_settings = SettingsCache::hydrate(InMemorySettingsStore::with_rows(guild_rows))
        .await
        .unwrap();
    let user_settings = SettingsCache::hydrate(InMemorySettingsStore::with_rows(user_rows))
        .await
        .unwrap();

    let (transport, rx) = ChannelTransport::new();
    let notifier = ChangeNotifier::new(TEST_CLUSTER);
    notifier.attach(Arc::new(transport));

    let client = SettingsClient::new(guild_settings, user_settings, notifier, policy);
    (Arc::new(client), rx)
}

/// Everything published so far, decoded.
pub fn drain(rx: &mut UnboundedReceiver<Vec<u8>>) -> Vec<BusEvent> {
    let mut events = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        events.push(decode(&frame).unwrap());
    }
    events
}
