// Domain types shared by the settings cache and the per-entity facades.
//
// Nothing in here knows about serenity. The Discord layer adapts its cached
// guilds and users into these shapes so the core can be driven by fakes in tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Raw Discord identifier.
pub type Snowflake = u64;

// ============================================================================
// OPTION KEYS
// ============================================================================

pub const MOD_ONLY: &str = "commands.modonly";
pub const ADMIN_ONLY: &str = "commands.adminonly";
pub const FEATURED: &str = "utils.featured";
pub const PUBLIC: &str = "utils.public";

/// Prefix for the per-migration idempotency markers.
pub const MIGRATION_MARKER_PREFIX: &str = "settings.migration";

/// Guild feature that makes a guild publicly listed regardless of `utils.public`.
pub const DISCOVERABLE_FEATURE: &str = "DISCOVERABLE";

pub fn migration_marker(migration_id: &str) -> String {
    format!("{}.{}", MIGRATION_MARKER_PREFIX, migration_id)
}

// ============================================================================
// ENTITY REFERENCES
// ============================================================================

/// Anything that can stand in for a guild or user when logging and caching.
pub trait Entity {
    fn id(&self) -> Snowflake;

    /// Human readable name used in log lines.
    fn label(&self) -> String;
}

impl<T: Entity + ?Sized> Entity for Arc<T> {
    fn id(&self) -> Snowflake {
        (**self).id()
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

/// Either a bare id or a resolved entity from the gateway cache.
///
/// Every cache operation goes through [`EntityRef::id`], so a facade built from
/// an id and one built from the resolved entity hit the same cache entry.
#[derive(Debug, Clone)]
pub enum EntityRef<T> {
    Id(Snowflake),
    Resolved(T),
}

impl<T: Entity> EntityRef<T> {
    pub fn id(&self) -> Snowflake {
        match self {
            EntityRef::Id(id) => *id,
            EntityRef::Resolved(entity) => entity.id(),
        }
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            EntityRef::Id(_) => None,
            EntityRef::Resolved(entity) => Some(entity),
        }
    }

    /// `"Name (id)"` for resolved entities, the bare id otherwise.
    pub fn label(&self) -> String {
        match self {
            EntityRef::Id(id) => id.to_string(),
            EntityRef::Resolved(entity) => format!("{} ({})", entity.label(), entity.id()),
        }
    }
}

impl<T> From<Snowflake> for EntityRef<T> {
    fn from(id: Snowflake) -> Self {
        EntityRef::Id(id)
    }
}

// ============================================================================
// GUILDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text,
    Voice,
    Category,
    Other,
}

/// A channel as seen by the migration: who it is and which category holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: Snowflake,
    pub kind: ChannelKind,
    pub parent_id: Option<Snowflake>,
}

impl ChannelInfo {
    pub fn is_category(&self) -> bool {
        self.kind == ChannelKind::Category
    }
}

/// Public facing guild data, read from the gateway cache.
#[derive(Debug, Clone, Default)]
pub struct GuildProfile {
    pub name: String,
    pub icon: Option<String>,
    pub splash: Option<String>,
    pub vanity: Option<String>,
    pub member_count: u64,
    pub features: Vec<String>,
}

/// A guild resolved from the gateway cache.
///
/// Implementations read their data at call time; a migration that waits for the
/// ready gate must see channels that were not cached when the facade was built.
pub trait GuildHandle: Entity + Send + Sync {
    fn channels(&self) -> Vec<ChannelInfo>;

    fn profile(&self) -> GuildProfile;
}

pub type GuildRef = EntityRef<Arc<dyn GuildHandle>>;

impl From<Arc<dyn GuildHandle>> for GuildRef {
    fn from(guild: Arc<dyn GuildHandle>) -> Self {
        EntityRef::Resolved(guild)
    }
}

/// Snapshot pushed to the discovery directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverableGuild {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub splash: Option<String>,
    pub vanity: Option<String>,
    pub members: u64,
    pub featured: bool,
    pub cluster: u32,
}

// ============================================================================
// USERS
// ============================================================================

/// A user resolved from the gateway. Only the id and tag matter to the settings core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Snowflake,
    pub tag: String,
}

impl Entity for UserProfile {
    fn id(&self) -> Snowflake {
        self.id
    }

    fn label(&self) -> String {
        self.tag.clone()
    }
}

pub type UserRef = EntityRef<UserProfile>;

impl From<UserProfile> for UserRef {
    fn from(user: UserProfile) -> Self {
        EntityRef::Resolved(user)
    }
}

// ============================================================================
// STORED VALUES
// ============================================================================

/// One row of the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSetting {
    pub entity_id: Snowflake,
    pub key: String,
    pub value: Value,
}

/// Reads a list of snowflakes out of a stored JSON value.
///
/// Entries may be strings (the stored form) or plain numbers; anything else is dropped.
pub fn snowflake_list(value: &Value) -> Vec<Snowflake> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => s.parse().ok(),
                Value::Number(n) => n.as_u64(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Inverse of [`snowflake_list`]; always writes the string form.
pub fn snowflake_list_value(ids: &[Snowflake]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}
