//! Sync daemon: turns a configuration file into scheduled source syncs and
//! keeps them in step with the file.

mod daemon;
mod error;
mod options;
mod runtime;

pub use daemon::SyncDaemon;
pub use error::DaemonError;
pub use options::{DaemonOptions, SELF_RELOAD_INTERVAL};
pub use runtime::{init_tracing, run, start_blocking};
