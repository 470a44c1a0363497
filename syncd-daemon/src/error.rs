use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon and its runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("sync daemon is already running")]
    AlreadyRunning,

    /// `run` was called on a daemon whose previous run already ended.
    #[error("sync daemon has already terminated and cannot be run again")]
    Terminated,

    #[error("config error: {0}")]
    Config(#[from] syncd_core::ConfigError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] syncd_scheduler::SchedulerError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("signal handler failed: {0}")]
    Signal(String),

    #[error("daemon worker join failure: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
