//! Cache configuration.
//!
//! Controls the render cache orchestrator and the in-memory store via `fragcache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

pub(crate) const DEFAULT_READ_TIMEOUT_MS: u64 = 250;
pub(crate) const DEFAULT_WRITE_TIMEOUT_MS: u64 = 500;
pub(crate) const DEFAULT_MEMORY_STORE_LIMIT: usize = 1024;

/// Cache configuration from `fragcache.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Consult and populate the store at all.
    pub enabled: bool,
    /// Mark cache misses in rendered output.
    pub diagnostic_mode: bool,
    /// Upper bound on a single store read; slower reads count as unavailable.
    pub read_timeout_ms: u64,
    /// Upper bound on a single store write.
    pub write_timeout_ms: u64,
    /// Maximum fragments held by the in-memory store.
    pub memory_store_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            diagnostic_mode: false,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            memory_store_limit: DEFAULT_MEMORY_STORE_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            diagnostic_mode: settings.diagnostic_mode,
            read_timeout_ms: settings.read_timeout.as_millis() as u64,
            write_timeout_ms: settings.write_timeout.as_millis() as u64,
            memory_store_limit: settings.memory_store_limit.get(),
        }
    }
}

impl CacheConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Returns the memory store limit as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_store_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_store_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
