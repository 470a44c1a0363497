//! Include planning: where a discovered source path should land locally.
//!
//! Moving the bytes and cleaning up stale files happen outside this crate;
//! the evaluator only plans and reports each transfer.

use std::path::PathBuf;

use syncd_core::{IncludeRule, Rule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    /// Source path as listed by the source.
    pub path: String,
    pub destination: PathBuf,
    pub cleanup: bool,
}

/// Map `path` through `include`, or `None` when the include does not cover it.
///
/// The rule prefix is stripped first, then the include's `from`; the rest is
/// joined onto `to`.
pub fn plan_transfer(rule: &Rule, include: &IncludeRule, path: &str) -> Option<PlannedTransfer> {
    let relative = path.strip_prefix(rule.prefix.as_str())?;
    let rest = relative.strip_prefix(include.from.as_str())?;
    let rest = rest.trim_start_matches('/');

    let destination = if rest.is_empty() {
        PathBuf::from(&include.to)
    } else {
        PathBuf::from(&include.to).join(rest)
    };
    Some(PlannedTransfer {
        path: path.to_string(),
        destination,
        cleanup: include.cleanup,
    })
}
