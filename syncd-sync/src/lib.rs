//! # syncd-sync
//!
//! Rule evaluation for one source: enumerate files, plan their transfers, run
//! the after-sync commands, retry the whole attempt on failure.
//!
//! Call [`RuleEvaluator::sync_source`] to run every rule of a source in order,
//! or [`RuleEvaluator::evaluate`] for a single rule.

pub mod command;
pub mod error;
pub mod evaluator;
pub mod include;

pub use command::{invoke, CommandOutput};
pub use error::SyncError;
pub use evaluator::{RuleEvaluator, DEFAULT_RETRY_BACKOFF};
pub use include::{plan_transfer, PlannedTransfer};
