//! Rule evaluation with retry.
//!
//! One attempt = enumerate the rule's prefix (planning a transfer for every
//! include that covers each path), then run every after-sync command in
//! order. A failed attempt is retried as a whole after a fixed backoff until
//! the rule's `max_failures` is exhausted; the last error is returned.

use std::thread::sleep;
use std::time::{Duration, Instant};

use syncd_core::{Rule, SourceSettings};

use crate::command;
use crate::error::SyncError;
use crate::include::plan_transfer;

/// Pause between two attempts of the same rule.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    backoff: Duration,
}

impl RuleEvaluator {
    pub fn new() -> Self {
        Self {
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Evaluate every rule of `source` in order, stopping at the first rule
    /// that fails after its retries.
    pub fn sync_source(&self, source: &SourceSettings) -> Result<(), SyncError> {
        let started = Instant::now();
        for rule in &source.rules {
            self.evaluate(source, rule)?;
        }
        tracing::info!(
            source = %source.id,
            rules = source.rules.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "source sync completed",
        );
        Ok(())
    }

    /// Run `rule` against `source`, retrying failed attempts.
    pub fn evaluate(&self, source: &SourceSettings, rule: &Rule) -> Result<(), SyncError> {
        let max_attempts = rule.max_failures.max_attempts();
        let mut attempt: u64 = 1;
        loop {
            tracing::info!(
                source = %source.id,
                rule = %rule.id,
                attempt,
                max_attempts = %rule.max_failures,
                "rule evaluation started",
            );

            let err = match self.attempt(source, rule) {
                Ok(files) => {
                    tracing::info!(
                        source = %source.id,
                        rule = %rule.id,
                        attempt,
                        files,
                        "rule evaluation complete",
                    );
                    return Ok(());
                }
                Err(err) => err,
            };

            if max_attempts.is_some_and(|max| attempt >= max) {
                tracing::error!(
                    source = %source.id,
                    rule = %rule.id,
                    attempt,
                    max_attempts = %rule.max_failures,
                    error = %err,
                    "rule evaluation failed, giving up",
                );
                return Err(err);
            }

            tracing::warn!(
                source = %source.id,
                rule = %rule.id,
                attempt,
                max_attempts = %rule.max_failures,
                backoff_ms = self.backoff.as_millis() as u64,
                error = %err,
                "rule evaluation failed, retrying",
            );
            sleep(self.backoff);
            attempt += 1;
        }
    }

    /// A single attempt. Returns the number of files covered by an include.
    fn attempt(&self, source: &SourceSettings, rule: &Rule) -> Result<usize, SyncError> {
        let mut covered = 0usize;
        source
            .source
            .list_files(&rule.prefix, &mut |path| {
                let mut matched = false;
                for include in &rule.includes {
                    if let Some(plan) = plan_transfer(rule, include, path) {
                        matched = true;
                        tracing::debug!(
                            source = %source.id,
                            rule = %rule.id,
                            path = %plan.path,
                            destination = %plan.destination.display(),
                            cleanup = plan.cleanup,
                            "planned transfer",
                        );
                    }
                }
                if matched {
                    covered += 1;
                }
                Ok(())
            })
            .map_err(|error| SyncError::Source {
                source_id: source.id.clone(),
                rule_id: rule.id.clone(),
                error,
            })?;

        for entry in &rule.after_sync {
            command::invoke(entry)?;
        }
        Ok(covered)
    }
}

impl Default for RuleEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
