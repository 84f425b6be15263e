// Messages exchanged between clusters over the shared bus.

use crate::core::settings::{DiscoverableGuild, Snowflake};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Failed to encode bus message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode bus message: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Bus channel is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryUpdateOp {
    Sync,
    AddOrSync,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryUpdate {
    pub op: DiscoveryUpdateOp,
    pub guilds: Vec<DiscoverableGuild>,
}

/// New value of a synced setting.
///
/// `Deleted` encodes as the bare string `"deleted"` and real values are always
/// wrapped as `{"value": ...}`, so a stored string can never be mistaken for a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncValue {
    Value(Value),
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSync {
    /// Cluster that made the change.
    pub origin_id: u32,
    pub entity_id: Snowflake,
    pub setting_key: String,
    pub value: SyncValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusEvent {
    DiscoveryUpdate(DiscoveryUpdate),
    SettingsSync(SettingsSync),
}

impl BusEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::DiscoveryUpdate(_) => "DISCOVERY_UPDATE",
            BusEvent::SettingsSync(_) => "SETTINGS_SYNC",
        }
    }
}

pub fn encode(event: &BusEvent) -> Result<Vec<u8>, BusError> {
    serde_json::to_vec(event).map_err(BusError::Encode)
}

pub fn decode(frame: &[u8]) -> Result<BusEvent, BusError> {
    serde_json::from_slice(frame).map_err(BusError::Decode)
}
