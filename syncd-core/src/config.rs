//! Configuration loading.
//!
//! Load flow: read file → resolve `${env:NAME}` placeholders → parse YAML →
//! [`ConfigFile::validate`]. [`build_settings`] then turns a validated file
//! into runtime [`SourceSettings`] through a [`SourceRegistry`].

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::ConfigError;
use crate::source::SourceRegistry;
use crate::types::{ConfigFile, MaxFailures, Rule, SourceSettings, MAX_POLL_INTERVAL};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sync-daemon-config.yaml";

/// Matches `${env:NAME}`; capture group 1 is `NAME`.
static ENV_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{env:([A-Za-z_][A-Za-z0-9_]*)\}").expect("constant regex pattern is valid")
});

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Read, interpolate, parse and validate the configuration at `path`.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = resolve_env_vars(&raw)?;
    let config: ConfigFile = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Substitute every `${env:NAME}` with the value from the process environment.
pub fn resolve_env_vars(text: &str) -> Result<String, ConfigError> {
    resolve_env_vars_with(text, |name| std::env::var(name).ok())
}

/// [`resolve_env_vars`] with an injectable lookup.
pub fn resolve_env_vars_with<F>(text: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let resolved = ENV_PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        match lookup(name) {
            Some(value) => value,
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(resolved.into_owned()),
    }
}

// ---------------------------------------------------------------------------
// 2. Validate
// ---------------------------------------------------------------------------

impl ConfigFile {
    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("at least one source is required".into()));
        }
        if self.rules.is_empty() {
            return Err(ConfigError::Invalid("at least one rule is required".into()));
        }

        if let Some(id) = first_duplicate(self.sources.iter().map(|s| s.id.as_str())) {
            return Err(ConfigError::DuplicateSourceId(id.to_string()));
        }
        if let Some(id) = first_duplicate(self.rules.iter().map(|r| r.id.as_str())) {
            return Err(ConfigError::DuplicateRuleId(id.to_string()));
        }

        for source in &self.sources {
            if source.id.is_empty() {
                return Err(ConfigError::Invalid("source id must not be empty".into()));
            }
            if source.kind.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source id={}: kind must not be empty",
                    source.id
                )));
            }
            if source.poll_interval.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "source id={}: poll_interval must be positive",
                    source.id
                )));
            }
            if source.poll_interval > MAX_POLL_INTERVAL {
                return Err(ConfigError::Invalid(format!(
                    "source id={}: poll_interval {:?} exceeds the maximum of {:?}",
                    source.id, source.poll_interval, MAX_POLL_INTERVAL
                )));
            }
        }

        let source_ids: HashSet<&str> = self.sources.iter().map(|s| s.id.as_str()).collect();
        for rule in &self.rules {
            if rule.id.is_empty() {
                return Err(ConfigError::Invalid("rule id must not be empty".into()));
            }
            if !source_ids.contains(rule.source.as_str()) {
                return Err(ConfigError::UnknownSource {
                    rule: rule.id.clone(),
                    source_id: rule.source.clone(),
                });
            }
            if rule.max_failures < -1 || rule.max_failures > i64::from(u32::MAX) {
                return Err(ConfigError::Invalid(format!(
                    "rule id={}: max_failures must be -1 (unlimited) or a non-negative count, got {}",
                    rule.id, rule.max_failures
                )));
            }
            if rule.includes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "rule id={}: at least one include is required",
                    rule.id
                )));
            }
            if let Some(pos) = rule.after_sync.iter().position(|c| c.command.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "rule id={}: after_sync[{pos}].command must not be empty",
                    rule.id
                )));
            }
        }

        let used: HashSet<&str> = self.rules.iter().map(|r| r.source.as_str()).collect();
        let unused: Vec<String> = self
            .sources
            .iter()
            .filter(|s| !used.contains(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect();
        if !unused.is_empty() {
            return Err(ConfigError::UnusedSources(unused));
        }

        Ok(())
    }
}

fn first_duplicate<'a>(ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

// ---------------------------------------------------------------------------
// 3. Build runtime settings
// ---------------------------------------------------------------------------

/// Resolve each source through `registry` and attach its rules.
///
/// Source order follows the file; rules keep file order within their source.
pub fn build_settings(
    config: &ConfigFile,
    registry: &SourceRegistry,
) -> Result<Vec<SourceSettings>, ConfigError> {
    config.validate()?;

    let mut settings = Vec::with_capacity(config.sources.len());
    let mut index = HashMap::with_capacity(config.sources.len());
    for spec in &config.sources {
        let source = registry.build(spec)?;
        index.insert(spec.id.as_str(), settings.len());
        settings.push(SourceSettings {
            id: spec.id.clone(),
            source,
            poll_interval: spec.poll_interval,
            rules: Vec::new(),
        });
    }

    for spec in &config.rules {
        let Some(&slot) = index.get(spec.source.as_str()) else {
            return Err(ConfigError::UnknownSource {
                rule: spec.id.clone(),
                source_id: spec.source.clone(),
            });
        };
        let max_failures = if spec.max_failures < 0 {
            MaxFailures::Unlimited
        } else {
            let n = u32::try_from(spec.max_failures).map_err(|_| {
                ConfigError::Invalid(format!("rule id={}: max_failures out of range", spec.id))
            })?;
            MaxFailures::Limited(n)
        };
        settings[slot].rules.push(Rule {
            id: spec.id.clone(),
            prefix: spec.prefix.clone(),
            max_failures,
            after_sync: spec.after_sync.clone(),
            includes: spec.includes.clone(),
        });
    }

    Ok(settings)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
