//! File-level loading: I/O errors, parse errors with paths, env interpolation.

use std::fs;
use std::path::PathBuf;

use syncd_core::{build_settings, load_config_file, ConfigError, OnFailure, SourceRegistry};
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("sync-daemon.yaml");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn missing_file_reports_io_error_with_path() {
    let dir = TempDir::new().expect("tempdir");
    let err = load_config_file(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn corrupt_yaml_reports_parse_error_with_path() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "sources: [unclosed\n  - : :");
    let err = load_config_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("sync-daemon.yaml"));
}

#[test]
fn env_placeholders_resolve_before_parsing() {
    std::env::set_var("SYNCD_TEST_BUCKET", "resolved-bucket");
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
sources:
  - id: main
    kind: s3
    s3_config:
      bucket_name: ${env:SYNCD_TEST_BUCKET}
      region: us-east-1
rules:
  - id: all
    source: main
    after_sync:
      - command: ["echo", "${env:SYNCD_TEST_BUCKET}"]
    includes:
      - from: ""
        to: /tmp/out
"#,
    );

    let config = load_config_file(&path).expect("load");
    let s3 = config.sources[0].s3_config.as_ref().expect("s3 config");
    assert_eq!(s3.bucket_name, "resolved-bucket");
    assert_eq!(config.rules[0].after_sync[0].command, vec!["echo", "resolved-bucket"]);
    assert_eq!(config.rules[0].after_sync[0].on_failure, OnFailure::FailSync);

    let settings = build_settings(&config, &SourceRegistry::with_builtin()).expect("settings");
    assert_eq!(settings[0].rules.len(), 1);
}

#[test]
fn unset_env_placeholder_fails_load() {
    std::env::remove_var("SYNCD_TEST_DEFINITELY_UNSET");
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(&dir, "sources: []\n# ${env:SYNCD_TEST_DEFINITELY_UNSET}\n");
    let err = load_config_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnvVar(_)), "got: {err}");
}

#[test]
fn local_source_requires_local_config() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(
        &dir,
        "sources: [{id: l, kind: local}]\nrules: [{id: r, source: l, includes: [{from: a}]}]\n",
    );
    let config = load_config_file(&path).expect("structurally valid");
    let err = build_settings(&config, &SourceRegistry::with_builtin()).unwrap_err();
    assert!(err.to_string().contains("local_config is required"), "got: {err}");
}
