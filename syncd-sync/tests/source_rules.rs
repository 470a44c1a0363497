//! Rule evaluation against a real local directory tree with real commands.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use syncd_core::{CommandEntry, IncludeRule, LocalSource, MaxFailures, OnFailure, Rule, SourceSettings};
use syncd_sync::{RuleEvaluator, SyncError};
use tempfile::TempDir;

fn sh(script: String, on_failure: OnFailure) -> CommandEntry {
    CommandEntry {
        command: vec!["sh".into(), "-c".into(), script],
        on_failure,
    }
}

fn rule(id: &str, max_failures: MaxFailures, after_sync: Vec<CommandEntry>) -> Rule {
    Rule {
        id: id.into(),
        prefix: "conf/".into(),
        max_failures,
        after_sync,
        includes: vec![IncludeRule {
            from: "".into(),
            to: "/tmp/out".into(),
            cleanup: false,
        }],
    }
}

fn source(root: &Path, rules: Vec<Rule>) -> SourceSettings {
    SourceSettings {
        id: "local".into(),
        source: Arc::new(LocalSource::new(root)),
        poll_interval: Duration::from_secs(1),
        rules,
    }
}

fn evaluator() -> RuleEvaluator {
    RuleEvaluator::new().with_backoff(Duration::from_millis(10))
}

fn lines(path: &Path) -> usize {
    fs::read_to_string(path).map(|s| s.lines().count()).unwrap_or(0)
}

#[test]
fn commands_run_in_order_after_file_pass() {
    let root = TempDir::new().expect("root");
    fs::create_dir_all(root.path().join("conf")).expect("mkdir");
    fs::write(root.path().join("conf/app.yaml"), "x").expect("write");
    let log = root.path().join("order.log");

    let s = source(
        root.path(),
        vec![rule(
            "ordered",
            MaxFailures::Limited(0),
            vec![
                sh(format!("echo first >> {}", log.display()), OnFailure::FailSync),
                sh(format!("echo second >> {}", log.display()), OnFailure::FailSync),
            ],
        )],
    );
    evaluator().sync_source(&s).expect("sync");
    assert_eq!(fs::read_to_string(&log).expect("log"), "first\nsecond\n");
}

#[test]
fn ignored_command_failure_does_not_fail_the_rule() {
    let root = TempDir::new().expect("root");
    let log = root.path().join("after.log");

    let s = source(
        root.path(),
        vec![rule(
            "tolerant",
            MaxFailures::Limited(0),
            vec![
                sh("exit 1".into(), OnFailure::Ignore),
                sh(format!("echo ran >> {}", log.display()), OnFailure::FailSync),
            ],
        )],
    );
    evaluator().sync_source(&s).expect("ignored failure is absorbed");
    assert_eq!(lines(&log), 1);
}

#[test]
fn fail_sync_command_retries_whole_attempt() {
    let root = TempDir::new().expect("root");
    let log = root.path().join("attempts.log");

    let s = source(
        root.path(),
        vec![rule(
            "strict",
            MaxFailures::Limited(2),
            vec![sh(format!("echo try >> {}; exit 7", log.display()), OnFailure::FailSync)],
        )],
    );
    let err = evaluator().sync_source(&s).unwrap_err();
    assert!(matches!(err, SyncError::Command { .. }), "got: {err}");
    assert_eq!(lines(&log), 3, "one command run per attempt");
}

#[test]
fn first_failing_rule_stops_the_source() {
    let root = TempDir::new().expect("root");
    let log = root.path().join("later.log");

    let s = source(
        root.path(),
        vec![
            rule("broken", MaxFailures::Limited(0), vec![sh("exit 1".into(), OnFailure::FailSync)]),
            rule(
                "later",
                MaxFailures::Limited(0),
                vec![sh(format!("echo ran >> {}", log.display()), OnFailure::FailSync)],
            ),
        ],
    );
    assert!(evaluator().sync_source(&s).is_err());
    assert_eq!(lines(&log), 0, "rules after a failing rule must not run");
}
