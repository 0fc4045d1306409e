use serde::{Deserialize, Serialize};

use crate::ops::list_view::{Scope, SortMode};

/// Configuration from shoplist.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub list: ListConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage key holding the item blob
    #[serde(default = "default_storage_key")]
    pub key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            key: default_storage_key(),
        }
    }
}

pub const DEFAULT_STORAGE_KEY: &str = "shopping_items_v1";

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Hours a checked item is kept before the startup prune drops it
    #[serde(default = "default_checked_hours")]
    pub checked_hours: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            checked_hours: default_checked_hours(),
        }
    }
}

fn default_checked_hours() -> u32 {
    72
}

impl RetentionConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.checked_hours))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    /// Initial sort mode
    #[serde(default)]
    pub sort: SortMode,
    /// Initial grouping scope
    #[serde(default)]
    pub scope: Scope,
}
