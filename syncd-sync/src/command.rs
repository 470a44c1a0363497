//! After-sync command invocation.

use std::io;
use std::process::{Command, Stdio};

use syncd_core::{CommandEntry, OnFailure};

use crate::error::SyncError;

/// What a finished (or unstartable) command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `entry` to completion and apply its failure policy.
///
/// Output is captured either way. With [`OnFailure::Ignore`] an unsuccessful
/// command still returns `Ok` (and is logged at warn); with
/// [`OnFailure::FailSync`] it returns the failure with the captured output.
pub fn invoke(entry: &CommandEntry) -> Result<CommandOutput, SyncError> {
    let argv = &entry.command;
    tracing::info!(command = ?argv, on_failure = %entry.on_failure, "running after-sync command");

    let (status, captured) = match run(argv) {
        Ok(output) => output,
        Err(err) => {
            return match entry.on_failure {
                OnFailure::Ignore => {
                    tracing::warn!(command = ?argv, error = %err, "after-sync command failed to start, ignoring");
                    Ok(CommandOutput {
                        exit_code: None,
                        success: false,
                        stdout: String::new(),
                        stderr: String::new(),
                    })
                }
                OnFailure::FailSync => {
                    tracing::error!(command = ?argv, error = %err, "after-sync command failed to start");
                    Err(SyncError::Spawn {
                        argv: argv.clone(),
                        error: err,
                    })
                }
            };
        }
    };

    tracing::info!(
        command = ?argv,
        exit_code = ?captured.exit_code,
        success = captured.success,
        stdout = %captured.stdout,
        stderr = %captured.stderr,
        "after-sync command finished",
    );

    if captured.success {
        return Ok(captured);
    }
    match entry.on_failure {
        OnFailure::Ignore => {
            tracing::warn!(
                command = ?argv,
                status = %status,
                stdout = %captured.stdout,
                stderr = %captured.stderr,
                "after-sync command failed, ignoring",
            );
            Ok(captured)
        }
        OnFailure::FailSync => Err(SyncError::Command {
            argv: argv.clone(),
            status,
            stdout: captured.stdout,
            stderr: captured.stderr,
        }),
    }
}

fn run(argv: &[String]) -> io::Result<(String, CommandOutput)> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()?;

    Ok((
        output.status.to_string(),
        CommandOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn entry(argv: &[&str], on_failure: OnFailure) -> CommandEntry {
        CommandEntry {
            command: argv.iter().map(|s| s.to_string()).collect(),
            on_failure,
        }
    }

    const NOISY_FAILURE: &[&str] = &["sh", "-c", "echo out; echo err >&2; exit 3"];

    #[test]
    fn success_captures_stdout() {
        let output = invoke(&entry(&["echo", "hello"], OnFailure::FailSync)).expect("ok");
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "hello\n");
    }

    #[test]
    fn ignored_failure_returns_ok_with_output() {
        let output = invoke(&entry(NOISY_FAILURE, OnFailure::Ignore)).expect("ignored");
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn fail_sync_failure_returns_error_with_output() {
        let err = invoke(&entry(NOISY_FAILURE, OnFailure::FailSync)).unwrap_err();
        match &err {
            SyncError::Command {
                stdout, stderr, argv, ..
            } => {
                assert_eq!(stdout, "out\n");
                assert_eq!(stderr, "err\n");
                assert_eq!(argv[0], "sh");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("stderr='err"));
    }

    #[test]
    fn missing_program_follows_policy() {
        let argv = &["/definitely/not/a/program"];
        assert!(invoke(&entry(argv, OnFailure::Ignore)).is_ok());
        let err = invoke(&entry(argv, OnFailure::FailSync)).unwrap_err();
        assert!(matches!(err, SyncError::Spawn { .. }), "got: {err}");
    }

    #[test]
    fn empty_command_is_an_error_not_a_panic() {
        let err = invoke(&entry(&[], OnFailure::FailSync)).unwrap_err();
        assert!(matches!(err, SyncError::Spawn { .. }));
    }
}
