//! syncd core library: configuration model, loading and source capabilities.
//!
//! - [`types`]: configuration file model and the validated runtime settings
//! - [`config`]: YAML loading, `${env:NAME}` interpolation, validation
//! - [`source`]: the [`Source`] capability and the kind-keyed [`SourceRegistry`]
//! - [`error`]: [`ConfigError`] and [`SourceError`]

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::{
    build_settings, load_config_file, resolve_env_vars, resolve_env_vars_with, DEFAULT_CONFIG_PATH,
};
pub use error::{ConfigError, SourceError};
pub use source::{LocalSource, S3Source, Source, SourceFactory, SourceRegistry};
pub use types::{
    CommandEntry, ConfigFile, IncludeRule, LocalConfig, MaxFailures, OnFailure, Rule, RuleSpec,
    S3Config, SourceSettings, SourceSpec, DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL,
};
