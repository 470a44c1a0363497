use std::path::PathBuf;
use std::time::Duration;

use syncd_core::SourceRegistry;
use syncd_sync::DEFAULT_RETRY_BACKOFF;

/// How often the daemon re-reads its own configuration.
pub const SELF_RELOAD_INTERVAL: Duration = Duration::from_secs(30);

/// Everything [`crate::SyncDaemon`] needs to start.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub config_path: PathBuf,
    /// Re-read the config every `reload_interval` and reschedule on change.
    pub auto_reload: bool,
    pub reload_interval: Duration,
    /// Pause between failed attempts of a rule.
    pub retry_backoff: Duration,
    pub registry: SourceRegistry,
    /// Filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl DaemonOptions {
    pub fn new(config_path: impl Into<PathBuf>, auto_reload: bool) -> Self {
        Self {
            config_path: config_path.into(),
            auto_reload,
            reload_interval: SELF_RELOAD_INTERVAL,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            registry: SourceRegistry::with_builtin(),
            log_level: "info".to_string(),
        }
    }

    pub fn with_reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_registry(mut self, registry: SourceRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}
