// Outbound side of the cluster bus.

use super::bus_models::{encode, BusError, BusEvent};
use std::sync::{Arc, RwLock};

/// Whatever carries encoded frames to the other clusters.
pub trait BusTransport: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> Result<(), BusError>;
}

/// Fire-and-forget publisher used by the settings facades.
///
/// The transport is optional: while the bus link is down, publishing does nothing.
/// Nothing published here is acknowledged or retried.
pub struct ChangeNotifier {
    cluster_id: u32,
    transport: RwLock<Option<Arc<dyn BusTransport>>>,
}

impl ChangeNotifier {
    pub fn new(cluster_id: u32) -> Self {
        Self {
            cluster_id,
            transport: RwLock::new(None),
        }
    }

    pub fn cluster_id(&self) -> u32 {
        self.cluster_id
    }

    pub fn attach(&self, transport: Arc<dyn BusTransport>) {
        if let Ok(mut slot) = self.transport.write() {
            *slot = Some(transport);
        }
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.transport.write() {
            *slot = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn BusTransport>> {
        self.transport.read().ok().and_then(|slot| slot.clone())
    }

    /// Encode and send an event. Never fails; problems are logged.
    pub fn publish(&self, event: BusEvent) {
        let Some(transport) = self.current() else {
            tracing::trace!(event = event.kind(), "Bus not connected, dropping event");
            return;
        };

        let frame = match encode(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = event.kind(), "{}", e);
                return;
            }
        };

        if let Err(e) = transport.send(frame) {
            tracing::warn!(event = event.kind(), "Failed to publish bus event: {}", e);
        }
    }
}
