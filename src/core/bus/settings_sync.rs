// Inbound side of the cluster bus.
//
// Other clusters persist user setting changes themselves and broadcast them as
// SETTINGS_SYNC. Here we only bring our in-memory copy up to date.

use super::bus_models::{decode, BusError, BusEvent, SettingsSync, SyncValue};
use crate::core::settings::{SettingsClient, SettingsStore};
use std::sync::Arc;

pub struct SettingsSyncHandler<S: SettingsStore> {
    client: Arc<SettingsClient<S>>,
}

impl<S: SettingsStore + 'static> SettingsSyncHandler<S> {
    pub fn new(client: Arc<SettingsClient<S>>) -> Self {
        Self { client }
    }

    /// Decode and apply one frame. Undecodable frames are reported, not applied.
    pub fn handle_frame(&self, frame: &[u8]) -> Result<(), BusError> {
        let event = decode(frame)?;
        self.apply(event);
        Ok(())
    }

    pub fn apply(&self, event: BusEvent) {
        match event {
            BusEvent::SettingsSync(sync) => self.apply_sync(sync),
            // Consumed by the discovery directory, not by clusters.
            BusEvent::DiscoveryUpdate(_) => {}
        }
    }

    fn apply_sync(&self, sync: SettingsSync) {
        if sync.origin_id == self.client.cluster_id() {
            return;
        }

        let cache = &self.client.user_settings;
        match sync.value {
            SyncValue::Value(value) => cache.apply_remote(sync.entity_id, &sync.setting_key, value),
            SyncValue::Deleted => cache.evict_remote(sync.entity_id, &sync.setting_key),
        }

        tracing::debug!(
            origin = sync.origin_id,
            user_id = sync.entity_id,
            setting = %sync.setting_key,
            "Applied remote settings change"
        );
    }
}
