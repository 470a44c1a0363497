//! Error types for syncd-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading, validating, or materialising a
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error with the file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `${env:NAME}` placeholder references an unset variable.
    #[error("env variable '{0}' is used in config but not set")]
    MissingEnvVar(String),

    #[error("invalid sources: non-unique id='{0}'")]
    DuplicateSourceId(String),

    #[error("invalid rules: non-unique id='{0}'")]
    DuplicateRuleId(String),

    #[error("rule id={rule}: source with id={source_id} is not found")]
    UnknownSource { rule: String, source_id: String },

    #[error("unused sources found: {0:?}")]
    UnusedSources(Vec<String>),

    #[error("source id={id}: unknown source kind '{kind}'")]
    UnknownSourceKind { id: String, kind: String },

    /// Any other semantic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures raised by a [`crate::Source`] while enumerating paths.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listing failed: {0}")]
    Listing(String),

    /// The per-path handler aborted the enumeration.
    #[error("path handler failed for '{path}': {reason}")]
    Handler { path: String, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
