//! Timeline configuration.
//!
//! Configuration covers:
//! - Entry and query cache sizing
//! - Background sweep cadence
//! - Persistence window and storage key
//! - Metrics window and default page size

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{Result, TimelineError};

/// Main timeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimelineConfig {
    /// Cache of correlation id → most recent entry.
    pub entry_cache: CacheConfig,
    /// Cache of canonical filter → matching entries.
    pub query_cache: CacheConfig,
    /// Interval between proactive sweeps of expired cache entries, in seconds.
    pub sweep_interval_secs: u64,
    /// Number of most recent entries written to the durable store.
    pub persist_window: usize,
    /// Key the history is stored under.
    pub storage_key: String,
    /// Samples kept per metrics channel.
    pub metrics_window: usize,
    /// Page size used by [`Timeline::query_page`](crate::Timeline::query_page).
    pub default_page_size: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            entry_cache: CacheConfig {
                capacity: 500,
                ttl_secs: 300,
            },
            query_cache: CacheConfig {
                capacity: 50,
                ttl_secs: 300,
            },
            sweep_interval_secs: 60,
            persist_window: 1000,
            storage_key: "event-timeline.history".to_string(),
            metrics_window: 100,
            default_page_size: 50,
        }
    }
}

impl TimelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            TimelineError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TimelineError::Config(format!("invalid TOML: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.entry_cache.capacity == 0 {
            return Err(TimelineError::Config(
                "entry_cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.query_cache.capacity == 0 {
            return Err(TimelineError::Config(
                "query_cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(TimelineError::Config(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.persist_window == 0 {
            return Err(TimelineError::Config(
                "persist_window must be at least 1".to_string(),
            ));
        }
        if self.storage_key.trim().is_empty() {
            return Err(TimelineError::Config(
                "storage_key cannot be empty".to_string(),
            ));
        }
        if self.metrics_window == 0 {
            return Err(TimelineError::Config(
                "metrics_window must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 {
            return Err(TimelineError::Config(
                "default_page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sweep interval as a [`Duration`].
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Sets the entry cache configuration.
    #[must_use]
    pub const fn with_entry_cache(mut self, cache: CacheConfig) -> Self {
        self.entry_cache = cache;
        self
    }

    /// Sets the query cache configuration.
    #[must_use]
    pub const fn with_query_cache(mut self, cache: CacheConfig) -> Self {
        self.query_cache = cache;
        self
    }

    /// Sets the persistence window.
    #[must_use]
    pub const fn with_persist_window(mut self, window: usize) -> Self {
        self.persist_window = window;
        self
    }

    /// Sets the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the sweep interval in seconds.
    #[must_use]
    pub const fn with_sweep_interval_secs(mut self, secs: u64) -> Self {
        self.sweep_interval_secs = secs;
        self
    }
}
