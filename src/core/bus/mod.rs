// Cluster bus: the events exchanged between clusters and both ends of the link.

pub mod bus_models;
pub mod change_notifier;
pub mod settings_sync;

pub use bus_models::{BusError, BusEvent, DiscoveryUpdate, DiscoveryUpdateOp, SettingsSync, SyncValue};
pub use change_notifier::{BusTransport, ChangeNotifier};
pub use settings_sync::SettingsSyncHandler;
