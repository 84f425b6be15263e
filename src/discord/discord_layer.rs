// Discord layer - commands, event handlers and the adapters between serenity
// types and the settings core.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "settings/adapters.rs"]
pub mod adapters;

#[path = "settings/events.rs"]
pub mod events;

// Re-export command types for convenience
pub use commands::{Context, Data, Error};
