//! # syncd-scheduler
//!
//! Runs a fixed set of periodic tasks on one background thread until a task
//! fails or a stop is requested.
//!
//! Call [`Scheduler::schedule`] to start an epoch, [`Scheduler::wait`] to
//! block until it ends, and [`Scheduler::stop`] from any thread to end it at
//! the next tick.

pub mod error;
mod scheduler;
pub mod task;

pub use error::{SchedulerError, TaskError};
pub use scheduler::{Scheduler, DEFAULT_TICK};
pub use task::{BoxError, Task};
