//! Error types for syncd-sync.

use syncd_core::SourceError;
use thiserror::Error;

/// All errors that can arise while evaluating a rule.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Enumerating the source failed.
    #[error("source id={source_id} rule id={rule_id}: {error}")]
    Source {
        source_id: String,
        rule_id: String,
        #[source]
        error: SourceError,
    },

    /// An after-sync command ran and exited unsuccessfully.
    #[error("failed to execute command {argv:?}: {status}: stdout='{stdout}', stderr='{stderr}'")]
    Command {
        argv: Vec<String>,
        status: String,
        stdout: String,
        stderr: String,
    },

    /// An after-sync command could not be started at all.
    #[error("failed to spawn command {argv:?}: {error}")]
    Spawn {
        argv: Vec<String>,
        #[source]
        error: std::io::Error,
    },
}
