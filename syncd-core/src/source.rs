//! Source capabilities and the kind-keyed registry that builds them.
//!
//! A [`Source`] knows one thing: how to enumerate the paths under a prefix.
//! New kinds are added by registering a [`SourceFactory`] under the
//! configuration's `kind` string; nothing downstream changes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{io_err, ConfigError, SourceError};
use crate::types::SourceSpec;

/// Handler invoked once per discovered path.
pub type PathHandler<'a> = dyn FnMut(&str) -> Result<(), SourceError> + 'a;

/// Capability to enumerate files of a remote (or local) location.
pub trait Source: Send + Sync + fmt::Debug {
    /// The registry key this source was built from.
    fn kind(&self) -> &'static str;

    /// Call `handler` once for every file under `prefix`.
    ///
    /// Stops at, and returns, the first handler error.
    fn list_files(&self, prefix: &str, handler: &mut PathHandler<'_>) -> Result<(), SourceError>;
}

/// Builds a [`Source`] from its configuration entry.
pub type SourceFactory = fn(&SourceSpec) -> Result<Arc<dyn Source>, ConfigError>;

#[derive(Clone)]
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// An empty registry. Most callers want [`SourceRegistry::with_builtin`].
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry pre-populated with the `s3` and `local` kinds.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(S3Source::KIND, S3Source::from_spec);
        registry.register(LocalSource::KIND, LocalSource::from_spec);
        registry
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: SourceFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(&self, spec: &SourceSpec) -> Result<Arc<dyn Source>, ConfigError> {
        let factory =
            self.factories
                .get(&spec.kind)
                .ok_or_else(|| ConfigError::UnknownSourceKind {
                    id: spec.id.clone(),
                    kind: spec.kind.clone(),
                })?;
        factory(spec)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// s3
// ---------------------------------------------------------------------------

/// Object-storage bucket source.
///
/// Speaks no wire protocol of its own: listing yields no paths until an
/// object-store client is wired in behind this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Source {
    pub bucket_name: String,
    pub region: String,
}

impl S3Source {
    pub const KIND: &'static str = "s3";

    pub fn new(bucket_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: region.into(),
        }
    }

    fn from_spec(spec: &SourceSpec) -> Result<Arc<dyn Source>, ConfigError> {
        let cfg = spec.s3_config.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!("source id={}: s3_config is required", spec.id))
        })?;
        if cfg.bucket_name.is_empty() || cfg.region.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "source id={}: s3_config.bucket_name and s3_config.region must be set",
                spec.id
            )));
        }
        Ok(Arc::new(S3Source::new(&cfg.bucket_name, &cfg.region)))
    }
}

impl Source for S3Source {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn list_files(&self, prefix: &str, _handler: &mut PathHandler<'_>) -> Result<(), SourceError> {
        tracing::debug!(
            bucket = %self.bucket_name,
            region = %self.region,
            prefix,
            "s3 listing yields no objects without an object-store client",
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// local
// ---------------------------------------------------------------------------

/// A directory tree on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    pub root: PathBuf,
}

impl LocalSource {
    pub const KIND: &'static str = "local";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn from_spec(spec: &SourceSpec) -> Result<Arc<dyn Source>, ConfigError> {
        let cfg = spec.local_config.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!("source id={}: local_config is required", spec.id))
        })?;
        Ok(Arc::new(LocalSource::new(&cfg.root)))
    }
}

impl Source for LocalSource {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn list_files(&self, prefix: &str, handler: &mut PathHandler<'_>) -> Result<(), SourceError> {
        let start = self.root.join(prefix.trim_start_matches('/'));
        let mut files = Vec::new();
        collect_files(&start, &mut files)?;
        files.sort();

        for file in files {
            let Ok(relative) = file.strip_prefix(&self.root) else {
                continue;
            };
            let path = relative_to_slash(relative);
            // `root/prefix` may cut a file name in half ("logs/ap" → "logs/app.log").
            if !path.starts_with(prefix.trim_start_matches('/')) {
                continue;
            }
            handler(&path)?;
        }
        Ok(())
    }
}

/// Collect regular files under `start`. A prefix naming a partial file name
/// falls back to scanning its parent directory.
fn collect_files(start: &Path, out: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    match fs::metadata(start) {
        Ok(meta) if meta.is_file() => {
            out.push(start.to_path_buf());
            return Ok(());
        }
        Ok(_) => return walk_dir(start, out),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(start, err)),
    }
    match start.parent() {
        Some(parent) if parent.is_dir() => {
            let mut candidates = Vec::new();
            walk_dir(parent, &mut candidates)?;
            let wanted = start.to_string_lossy().into_owned();
            out.extend(
                candidates
                    .into_iter()
                    .filter(|p| p.to_string_lossy().starts_with(&wanted)),
            );
            Ok(())
        }
        _ => Ok(()),
    }
}

fn walk_dir(root: &Path, out: &mut Vec<PathBuf>) -> Result<(), SourceError> {
    let mut dirs = vec![root.to_path_buf()];
    while let Some(current) = dirs.pop() {
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            if ty.is_dir() {
                dirs.push(entry.path());
            } else if ty.is_file() {
                out.push(entry.path());
            }
        }
    }
    Ok(())
}

fn relative_to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocalConfig, S3Config};
    use std::time::Duration;
    use tempfile::TempDir;

    fn spec(kind: &str) -> SourceSpec {
        SourceSpec {
            id: "src".into(),
            kind: kind.into(),
            poll_interval: Duration::from_secs(1),
            s3_config: None,
            local_config: None,
        }
    }

    fn list(source: &dyn Source, prefix: &str) -> Vec<String> {
        let mut seen = Vec::new();
        source
            .list_files(prefix, &mut |p| {
                seen.push(p.to_string());
                Ok(())
            })
            .expect("list");
        seen
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let registry = SourceRegistry::with_builtin();
        let err = registry.build(&spec("ftp")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSourceKind { .. }), "got: {err}");
    }

    #[test]
    fn s3_requires_its_config_block() {
        let registry = SourceRegistry::with_builtin();
        assert!(registry.build(&spec("s3")).is_err());

        let mut s3 = spec("s3");
        s3.s3_config = Some(S3Config {
            bucket_name: "bucket".into(),
            region: "eu-west-1".into(),
        });
        let source = registry.build(&s3).expect("build");
        assert_eq!(source.kind(), "s3");
        assert!(list(source.as_ref(), "any/").is_empty());
    }

    #[test]
    fn custom_kinds_can_be_registered() {
        #[derive(Debug)]
        struct Fixed;
        impl Source for Fixed {
            fn kind(&self) -> &'static str {
                "fixed"
            }
            fn list_files(
                &self,
                _prefix: &str,
                handler: &mut PathHandler<'_>,
            ) -> Result<(), SourceError> {
                handler("one")
            }
        }

        let mut registry = SourceRegistry::new();
        registry.register("fixed", |_| Ok(Arc::new(Fixed)));
        let source = registry.build(&spec("fixed")).expect("build");
        assert_eq!(list(source.as_ref(), ""), vec!["one"]);
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["fixed"]);
    }

    #[test]
    fn local_lists_files_under_prefix_sorted() {
        let root = TempDir::new().expect("root");
        fs::create_dir_all(root.path().join("conf/nested")).expect("mkdir");
        fs::create_dir_all(root.path().join("other")).expect("mkdir");
        fs::write(root.path().join("conf/b.yaml"), "b").expect("write");
        fs::write(root.path().join("conf/a.yaml"), "a").expect("write");
        fs::write(root.path().join("conf/nested/c.yaml"), "c").expect("write");
        fs::write(root.path().join("other/skip.txt"), "x").expect("write");

        let mut local = spec("local");
        local.local_config = Some(LocalConfig {
            root: root.path().to_path_buf(),
        });
        let source = SourceRegistry::with_builtin().build(&local).expect("build");

        assert_eq!(
            list(source.as_ref(), "conf/"),
            vec!["conf/a.yaml", "conf/b.yaml", "conf/nested/c.yaml"]
        );
        assert_eq!(list(source.as_ref(), "conf/a"), vec!["conf/a.yaml"]);
        assert_eq!(list(source.as_ref(), "").len(), 4);
        assert!(list(source.as_ref(), "missing/").is_empty());
    }

    #[test]
    fn local_propagates_handler_error() {
        let root = TempDir::new().expect("root");
        fs::write(root.path().join("file"), "x").expect("write");
        let source = LocalSource::new(root.path());

        let err = source
            .list_files("", &mut |p| {
                Err(SourceError::Handler {
                    path: p.to_string(),
                    reason: "boom".into(),
                })
            })
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
