// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "settings/mod.rs"]
pub mod settings;

#[path = "bus/mod.rs"]
pub mod bus;
