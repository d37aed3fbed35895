use std::time::Duration;

use serde::Deserialize;

/// The default capacity of a [`Cache`](crate::Cache) created with [`Cache::new`](crate::Cache::new).
pub const DEFAULT_MAX_ITEMS: usize = 1024;

/// Configuration of a [`Cache`](crate::Cache).
///
/// The creator and the optional evictor are passed to the cache directly, this only holds the
/// plain settings so they can be read from a configuration file:
///
/// ```yaml
/// name: objects
/// max_items: 4096
/// max_age: 1h
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache, used to tag logs and metrics.
    pub name: String,

    /// Maximum number of live entries. `0` disables capacity eviction.
    pub max_items: usize,

    /// Maximum time an entry is kept after its creation.
    ///
    /// Deadlines returned by the creator still apply, whichever is sooner wins. `None` (or a zero
    /// duration) disables age-based expiration.
    #[serde(with = "humantime_serde")]
    pub max_age: Option<Duration>,
}

impl CacheConfig {
    /// Returns `max_age`, treating a zero duration as unset.
    pub fn effective_max_age(&self) -> Option<Duration> {
        self.max_age.filter(|max_age| !max_age.is_zero())
    }

    /// Returns `max_items`, treating `0` as unlimited.
    pub fn capacity(&self) -> Option<usize> {
        (self.max_items != 0).then_some(self.max_items)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "default".into(),
            max_items: DEFAULT_MAX_ITEMS,
            max_age: None,
        }
    }
}
