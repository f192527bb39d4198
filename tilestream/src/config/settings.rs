//! Pipeline configuration values and defaults.

use std::time::Duration;

use super::ConfigError;

/// Default number of tile worker threads.
///
/// Building is mostly parse-bound per tile, so a small pool independent of
/// the core count is enough.
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Default tile cache budget (32 MiB).
pub const DEFAULT_CACHE_CAPACITY_BYTES: usize = 32 * 1024 * 1024;

/// Default number of ancestor levels requested as proxies.
pub const DEFAULT_PROXY_ANCESTOR_LEVELS: u8 = 2;

/// Default fade-in duration for newly installed tiles.
pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(300);

/// Upper bound on worker threads accepted by [`PipelineConfig::validate`].
pub const MAX_WORKER_COUNT: usize = 64;

/// How proxy tiles are used while required tiles load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// How many levels of ancestors to request for a loading tile.
    ///
    /// Zero disables ancestor proxies.
    pub ancestor_levels: u8,

    /// Reuse already built children (active or cached) of a loading tile.
    pub use_descendants: bool,

    /// Also enqueue tasks for missing children. Off by default: on zoom-out
    /// this would quadruple the work per required tile.
    pub request_descendants: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            ancestor_levels: DEFAULT_PROXY_ANCESTOR_LEVELS,
            use_descendants: true,
            request_descendants: false,
        }
    }
}

impl ProxyConfig {
    /// Proxy handling switched off entirely.
    pub fn disabled() -> Self {
        Self {
            ancestor_levels: 0,
            use_descendants: false,
            request_descendants: false,
        }
    }

    /// Returns true if any kind of proxy is in use.
    pub fn is_enabled(&self) -> bool {
        self.ancestor_levels > 0 || self.use_descendants || self.request_descendants
    }
}

/// Configuration for a [`Map`](crate::Map) / [`TileManager`](crate::TileManager).
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Number of tile worker threads.
    pub worker_count: usize,

    /// Tile cache memory budget in bytes.
    pub cache_capacity_bytes: usize,

    /// Proxy tile behavior.
    pub proxy: ProxyConfig,

    /// Fade-in duration for newly visible tiles.
    pub fade_duration: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            cache_capacity_bytes: DEFAULT_CACHE_CAPACITY_BYTES,
            proxy: ProxyConfig::default(),
            fade_duration: DEFAULT_FADE_DURATION,
        }
    }
}

impl PipelineConfig {
    /// Set the worker thread count.
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the cache budget.
    pub fn with_cache_capacity(mut self, bytes: usize) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    /// Set proxy behavior.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set the fade-in duration.
    pub fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = duration;
        self
    }

    /// Check that values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                section: "workers".to_string(),
                key: "count".to_string(),
                value: self.worker_count.to_string(),
                reason: format!("must be between 1 and {}", MAX_WORKER_COUNT),
            });
        }
        if self.proxy.ancestor_levels > crate::tile::MAX_ZOOM {
            return Err(ConfigError::InvalidValue {
                section: "proxy".to_string(),
                key: "ancestor_levels".to_string(),
                value: self.proxy.ancestor_levels.to_string(),
                reason: format!("must be at most {}", crate::tile::MAX_ZOOM),
            });
        }
        Ok(())
    }
}
