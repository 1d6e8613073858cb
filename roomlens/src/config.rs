//! Configuration types and defaults

use crate::sampler::DEFAULT_STATS_INTERVAL;
use roomlens_diagnostics::{activity_log::DEFAULT_CAPACITY, DebugLogger, DEFAULT_EXCLUDED_SETTINGS};
use std::time::Duration;

/// Global RoomLens configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Default polling period of the stats sampler
    pub stats_interval: Duration,
    /// Default `tracing` filter directive
    pub log_filter: String,
    /// Number of activity log lines kept
    pub activity_log_capacity: usize,
    /// Track settings never rendered
    pub excluded_settings: Vec<String>,
    /// Render remote tracks as soon as they are subscribed
    pub auto_attach: bool,
}

impl GlobalConfig {
    /// Logger using the configured filter
    pub fn logger(&self) -> DebugLogger {
        DebugLogger::new(self.log_filter.clone())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            stats_interval: DEFAULT_STATS_INTERVAL,
            log_filter: "info".to_string(),
            activity_log_capacity: DEFAULT_CAPACITY,
            excluded_settings: DEFAULT_EXCLUDED_SETTINGS.iter().map(|key| key.to_string()).collect(),
            auto_attach: true,
        }
    }
}

/// Room-specific configuration
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Polling period override; the global default applies when unset
    pub stats_interval: Option<Duration>,
    /// Poll statistics at all
    pub sample_stats: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            stats_interval: None,
            sample_stats: true,
        }
    }
}
