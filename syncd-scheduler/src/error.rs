//! Error types for syncd-scheduler.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::task::BoxError;

/// Errors surfaced by [`crate::Scheduler`].
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// `schedule` was called while an epoch is running and has not been stopped.
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("no tasks to schedule")]
    EmptyTaskSet,

    /// `schedule` or `wait` was called from inside a task of the running epoch.
    #[error("scheduler cannot be scheduled or awaited from its own task thread")]
    ReentrantCall,

    /// The previous epoch ended with a task failure that nobody cleared.
    #[error("scheduler is stopped, unable to schedule tasks: previously scheduled tasks failed: {0}")]
    PreviousEpochFailed(#[source] TaskError),

    /// A task of the current epoch failed and halted it.
    #[error("{0}")]
    TaskFailed(#[source] TaskError),

    /// A task's rate or start delay cannot be represented as a point in time.
    #[error("task '{task}': interval {interval:?} is too large to schedule")]
    IntervalOverflow { task: String, interval: Duration },

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(String),
}

impl SchedulerError {
    /// The task error behind this failure, if any.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            SchedulerError::PreviousEpochFailed(err) | SchedulerError::TaskFailed(err) => Some(err),
            _ => None,
        }
    }
}

/// A task failure, shareable between every thread blocked in `wait`.
#[derive(Clone)]
pub struct TaskError(Arc<dyn StdError + Send + Sync + 'static>);

impl TaskError {
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(err))
    }

    pub fn msg(message: impl Into<String>) -> Self {
        Self::from(BoxError::from(message.into()))
    }

    /// Borrow the original error as its concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl From<BoxError> for TaskError {
    fn from(err: BoxError) -> Self {
        Self(Arc::from(err))
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}
