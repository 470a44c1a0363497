//! Configuration model for the sync daemon.
//!
//! Two layers live here:
//! - the file model ([`ConfigFile`], [`SourceSpec`], [`RuleSpec`]) exactly as
//!   deserialized from YAML, compared structurally on reload;
//! - the runtime settings ([`SourceSettings`], [`Rule`]) built from a validated
//!   file model, with each source resolved to a live [`Source`] capability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::source::Source;

// ---------------------------------------------------------------------------
// Shared leaf types
// ---------------------------------------------------------------------------

/// What to do when an after-sync command exits unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Escalate the failure to the rule's retry loop.
    #[default]
    FailSync,
    /// Log the failure and carry on as if the command succeeded.
    Ignore,
}

impl fmt::Display for OnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnFailure::FailSync => write!(f, "fail_sync"),
            OnFailure::Ignore => write!(f, "ignore"),
        }
    }
}

/// An external command run after a successful file pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandEntry {
    /// Program followed by its arguments. Never empty once validated.
    pub command: Vec<String>,
    #[serde(default)]
    pub on_failure: OnFailure,
}

/// Maps a subtree of the source onto a local destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncludeRule {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cleanup: bool,
}

// ---------------------------------------------------------------------------
// File model
// ---------------------------------------------------------------------------

/// Root of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// A configured remote location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    /// Registry key selecting the [`Source`] implementation.
    pub kind: String,
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    #[serde(default)]
    pub s3_config: Option<S3Config>,
    #[serde(default)]
    pub local_config: Option<LocalConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocalConfig {
    pub root: std::path::PathBuf,
}

/// A rule as written in the file; `source` links it to a [`SourceSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    pub source: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_max_failures")]
    pub max_failures: i64,
    #[serde(default)]
    pub after_sync: Vec<CommandEntry>,
    #[serde(default)]
    pub includes: Vec<IncludeRule>,
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Longest accepted `poll_interval`: one year.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_max_failures() -> i64 {
    -1
}

// ---------------------------------------------------------------------------
// Runtime settings
// ---------------------------------------------------------------------------

/// How many failed attempts a rule tolerates before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFailures {
    /// Retry at most this many times after the first failed attempt.
    Limited(u32),
    /// Retry forever.
    Unlimited,
}

impl MaxFailures {
    /// Total attempts allowed, `None` when unlimited.
    pub fn max_attempts(self) -> Option<u64> {
        match self {
            MaxFailures::Limited(n) => Some(u64::from(n) + 1),
            MaxFailures::Unlimited => None,
        }
    }
}

impl fmt::Display for MaxFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max_attempts() {
            Some(n) => n.fmt(f),
            None => write!(f, "unlimited"),
        }
    }
}

/// A validated rule attached to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub prefix: String,
    pub max_failures: MaxFailures,
    pub after_sync: Vec<CommandEntry>,
    pub includes: Vec<IncludeRule>,
}

/// A source together with its ordered rules. Immutable once built; replaced
/// wholesale on reload.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub id: String,
    pub source: Arc<dyn Source>,
    pub poll_interval: Duration,
    pub rules: Vec<Rule>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
