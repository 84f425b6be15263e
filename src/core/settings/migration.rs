// Stored-schema migrations for guild settings.
//
// The March 2024 migration rewrites the command restriction lists: a category whose
// every child channel is restricted is stored as the category id instead of the
// individual channels, and ids of channels that no longer exist are dropped.

use super::settings_models::{ChannelInfo, Snowflake};
use std::collections::HashSet;
use std::time::Duration;

/// Bump this whenever the migration body changes, or already migrated guilds are skipped.
pub const RESTRICT_COMMAND_MIGRATION: &str = "March24-restrict-command";

/// Collapse fully restricted categories and drop unknown channels.
///
/// The result does not depend on the order categories are visited in, and feeding the
/// output back in returns it unchanged.
pub fn coalesce_categories(restricted: &[Snowflake], channels: &[ChannelInfo]) -> Vec<Snowflake> {
    let mut current: Vec<Snowflake> = Vec::with_capacity(restricted.len());
    for id in restricted {
        if !current.contains(id) {
            current.push(*id);
        }
    }

    for category in channels.iter().filter(|c| c.is_category()) {
        let children: Vec<Snowflake> = channels
            .iter()
            .filter(|c| c.parent_id == Some(category.id))
            .map(|c| c.id)
            .collect();

        if children.is_empty() {
            continue;
        }

        if children.iter().all(|child| current.contains(child)) {
            current.retain(|id| !children.contains(id));
            if !current.contains(&category.id) {
                current.push(category.id);
            }
        }
    }

    let known: HashSet<Snowflake> = channels.iter().map(|c| c.id).collect();
    current.retain(|id| known.contains(id));
    current
}

// ============================================================================
// RETRY POLICY
// ============================================================================

/// How often a failing migration is retried within one process.
#[derive(Debug, Clone, Copy)]
pub struct MigrationPolicy {
    /// Failures after which no further attempt is scheduled.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further failure.
    pub base_backoff: Duration,
}

impl MigrationPolicy {
    /// Whether another attempt may be scheduled after `failures` failed ones.
    pub fn allows_attempt(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }

    /// Delay before the next attempt. Zero for a first attempt.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = (failures - 1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(5),
        }
    }
}
