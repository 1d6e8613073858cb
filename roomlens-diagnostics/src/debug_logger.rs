//! Structured debug logging system

use roomlens_core::RoomLensError;
use tracing_subscriber::EnvFilter;

/// Installs the process-wide `tracing` subscriber
#[derive(Debug, Clone)]
pub struct DebugLogger {
    default_directive: String,
}

impl DebugLogger {
    /// Create a logger falling back to `default_directive` when `RUST_LOG`
    /// is not set
    pub fn new(default_directive: impl Into<String>) -> Self {
        Self {
            default_directive: default_directive.into(),
        }
    }

    /// Initialize logging with the `info` default
    pub fn init_logging() -> Result<(), RoomLensError> {
        Self::default().init()
    }

    /// Directive used when `RUST_LOG` is absent
    pub fn default_directive(&self) -> &str {
        &self.default_directive
    }

    /// Build the filter: `RUST_LOG` first, then the default directive
    pub fn env_filter(&self) -> Result<EnvFilter, RoomLensError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_directive))
            .map_err(|e| RoomLensError::Initialization {
                reason: format!("invalid log filter '{}': {}", self.default_directive, e),
            })
    }

    /// Install the subscriber. A second call reports an error instead of
    /// replacing the installed subscriber.
    pub fn init(&self) -> Result<(), RoomLensError> {
        let filter = self.env_filter()?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| RoomLensError::Initialization {
                reason: format!("failed to install log subscriber: {}", e),
            })
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new("info")
    }
}
