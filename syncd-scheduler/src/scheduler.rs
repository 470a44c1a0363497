//! Polling scheduler.
//!
//! ## Epoch lifecycle
//!
//! ```text
//! idle ──schedule──▶ running ──task error──▶ stopped-by-error ──┐
//!                       │                                       ├──▶ idle
//!                       └──────stop──────▶ stopped-by-request ──┘
//! ```
//!
//! One loop thread per epoch wakes every tick, checks the stop flag, then runs
//! every due task in order on that same thread. The first task error is
//! recorded as the epoch's terminal error and ends the loop; the rest of that
//! tick is skipped.
//!
//! Shared state is two primitives: an atomic stop flag (so `stop` never
//! blocks) and a mutex around the epoch bookkeeping, paired with a condvar
//! that `wait` sleeps on until the loop exits.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::error::{SchedulerError, TaskError};
use crate::task::Task;

/// Polling interval of the execution loop.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Handle to a scheduler. Clones share the same epoch state.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

struct Shared {
    stop: AtomicBool,
    state: Mutex<EpochState>,
    exited: Condvar,
    epochs: AtomicU64,
    live_loops: AtomicUsize,
    tick: Duration,
}

#[derive(Default)]
struct EpochState {
    /// A loop thread has been started and has not exited yet.
    active: bool,
    loop_thread: Option<ThreadId>,
    handle: Option<JoinHandle<()>>,
    /// Terminal error of the last epoch; cleared by the next `schedule`.
    error: Option<TaskError>,
}

struct ScheduledTask {
    task: Task,
    next_due: Instant,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    /// A scheduler polling every `tick` instead of [`DEFAULT_TICK`].
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                state: Mutex::new(EpochState::default()),
                exited: Condvar::new(),
                epochs: AtomicU64::new(0),
                live_loops: AtomicUsize::new(0),
                tick,
            }),
        }
    }

    /// Start a new epoch running `tasks`. Does not wait for any task to run.
    ///
    /// Fails with [`SchedulerError::AlreadyRunning`] while an epoch is running
    /// and not stopped. If the previous epoch was stopped but its loop has not
    /// exited yet, this blocks until the exit so that at most one loop exists:
    /// up to one tick plus the task in flight, including its retries.
    /// A terminal error of the previous epoch is returned as
    /// [`SchedulerError::PreviousEpochFailed`] instead of starting, whether or
    /// not `wait` already reported it, and is then cleared.
    /// Tasks whose rate or start delay overflow a point in time are rejected
    /// with [`SchedulerError::IntervalOverflow`].
    pub fn schedule(&self, tasks: Vec<Task>) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        let mut state = lock(&shared.state);

        if state.active {
            if state.loop_thread == Some(thread::current().id()) {
                return Err(SchedulerError::ReentrantCall);
            }
            if !shared.stop.load(Ordering::SeqCst) {
                return Err(SchedulerError::AlreadyRunning);
            }
            while state.active {
                state = shared
                    .exited
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        if let Some(handle) = state.handle.take() {
            // The loop has already marked itself inactive; this only reaps it.
            let _ = handle.join();
        }

        if let Some(err) = state.error.take() {
            return Err(SchedulerError::PreviousEpochFailed(err));
        }
        if tasks.is_empty() {
            return Err(SchedulerError::EmptyTaskSet);
        }
        check_intervals(&tasks, Instant::now())?;

        let epoch = shared.epochs.load(Ordering::SeqCst) + 1;
        shared.stop.store(false, Ordering::SeqCst);

        let loop_shared = Arc::clone(shared);
        let handle = thread::Builder::new()
            .name(format!("syncd-scheduler-{epoch}"))
            .spawn(move || run_epoch(loop_shared, tasks, epoch))
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;

        shared.epochs.store(epoch, Ordering::SeqCst);
        state.active = true;
        state.loop_thread = Some(handle.thread().id());
        state.handle = Some(handle);
        Ok(())
    }

    /// True while an epoch is running and no stop has been signalled.
    pub fn is_running(&self) -> bool {
        let state = lock(&self.shared.state);
        state.active && !self.shared.stop.load(Ordering::SeqCst)
    }

    /// Block until the current epoch ends; returns its terminal error.
    ///
    /// Returns `Ok(())` immediately when nothing is running and the last
    /// epoch (if any) ended cleanly. The error stays recorded until the next
    /// `schedule`, so every waiter sees it.
    pub fn wait(&self) -> Result<(), SchedulerError> {
        let shared = &self.shared;
        let mut state = lock(&shared.state);
        if state.active && state.loop_thread == Some(thread::current().id()) {
            return Err(SchedulerError::ReentrantCall);
        }
        while state.active {
            state = shared
                .exited
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match &state.error {
            Some(err) => Err(SchedulerError::TaskFailed(err.clone())),
            None => Ok(()),
        }
    }

    /// Ask the running epoch to end at its next tick. Never blocks.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_and_wait(&self) -> Result<(), SchedulerError> {
        self.stop();
        self.wait()
    }

    /// Number of epochs started so far.
    pub fn epochs(&self) -> u64 {
        self.shared.epochs.load(Ordering::SeqCst)
    }

    /// Number of loop threads currently alive. Never exceeds one.
    pub fn active_loops(&self) -> usize {
        self.shared.live_loops.load(Ordering::SeqCst)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn run_epoch(shared: Arc<Shared>, tasks: Vec<Task>, epoch: u64) {
    shared.live_loops.fetch_add(1, Ordering::SeqCst);
    let _exit = EpochExit {
        shared: &shared,
        epoch,
    };

    let started = Instant::now();
    let mut scheduled = Vec::with_capacity(tasks.len());
    for task in tasks {
        let Some(next_due) = started.checked_add(task.start_delay()) else {
            record_failure(&shared, epoch, &task, overflow(&task, task.start_delay()));
            return;
        };
        scheduled.push(ScheduledTask { task, next_due });
    }
    let mut tasks = scheduled;
    tracing::info!(epoch, tasks = tasks.len(), "scheduler epoch started");

    loop {
        thread::sleep(shared.tick);
        if shared.stop.load(Ordering::SeqCst) {
            tracing::info!(epoch, "scheduler epoch stopped on request");
            return;
        }

        for scheduled in &mut tasks {
            let now = Instant::now();
            if now < scheduled.next_due {
                continue;
            }
            let Some(next_due) = now.checked_add(scheduled.task.rate()) else {
                let err = overflow(&scheduled.task, scheduled.task.rate());
                record_failure(&shared, epoch, &scheduled.task, err);
                return;
            };
            scheduled.next_due = next_due;

            tracing::debug!(epoch, task = scheduled.task.name(), "running task");
            if let Err(err) = scheduled.task.run() {
                record_failure(&shared, epoch, &scheduled.task, TaskError::from(err));
                return;
            }
        }
    }
}

/// Record `err` as the epoch's terminal error and signal stop.
fn record_failure(shared: &Shared, epoch: u64, task: &Task, err: TaskError) {
    tracing::error!(
        epoch,
        task = task.name(),
        error = %err,
        "task failed, halting scheduler epoch",
    );
    let mut state = lock(&shared.state);
    shared.stop.store(true, Ordering::SeqCst);
    state.error = Some(err);
}

fn overflow(task: &Task, interval: Duration) -> TaskError {
    TaskError::new(SchedulerError::IntervalOverflow {
        task: task.name().to_string(),
        interval,
    })
}

/// Reject tasks whose first or second due time cannot be represented.
fn check_intervals(tasks: &[Task], now: Instant) -> Result<(), SchedulerError> {
    for task in tasks {
        let fits = now
            .checked_add(task.start_delay())
            .and_then(|first| first.checked_add(task.rate()))
            .is_some();
        if !fits {
            return Err(SchedulerError::IntervalOverflow {
                task: task.name().to_string(),
                interval: task.start_delay().max(task.rate()),
            });
        }
    }
    Ok(())
}

/// Marks the epoch finished and wakes every waiter, also when a task panics.
struct EpochExit<'a> {
    shared: &'a Shared,
    epoch: u64,
}

impl Drop for EpochExit<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.shared.state);
        if thread::panicking() {
            tracing::error!(epoch = self.epoch, "task panicked, halting scheduler epoch");
            self.shared.stop.store(true, Ordering::SeqCst);
            state.error = Some(TaskError::msg(format!(
                "scheduler epoch {} aborted: task panicked",
                self.epoch
            )));
        }
        state.active = false;
        state.loop_thread = None;
        self.shared.live_loops.fetch_sub(1, Ordering::SeqCst);
        drop(state);
        self.shared.exited.notify_all();
    }
}

fn lock(mutex: &Mutex<EpochState>) -> MutexGuard<'_, EpochState> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_task(name: &str, rate: Duration, counter: Arc<AtomicU32>) -> Task {
        Task::new(name, rate, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn wait_without_schedule_returns_immediately() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.is_running());
        scheduler.wait().expect("nothing to wait for");
        assert_eq!(scheduler.epochs(), 0);
    }

    #[test]
    fn empty_task_set_is_rejected() {
        let scheduler = Scheduler::new();
        let err = scheduler.schedule(Vec::new()).unwrap_err();
        assert!(matches!(err, SchedulerError::EmptyTaskSet), "got: {err}");
        assert_eq!(scheduler.epochs(), 0);
    }

    #[test]
    fn is_running_follows_stop() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(vec![counting_task("t", Duration::from_secs(60), counter)])
            .expect("schedule");
        assert!(scheduler.is_running());

        scheduler.stop();
        assert!(!scheduler.is_running());
        scheduler.wait().expect("clean stop");
        assert_eq!(scheduler.active_loops(), 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        scheduler
            .schedule(vec![counting_task("t", Duration::from_secs(60), counter)])
            .expect("schedule");
        scheduler.stop();
        scheduler.stop();
        scheduler.stop_and_wait().expect("clean stop");
        scheduler.stop_and_wait().expect("still clean");
    }

    #[test]
    fn scheduling_after_clean_stop_starts_a_new_epoch() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));
        let task = counting_task("t", Duration::from_secs(60), counter.clone());

        scheduler.schedule(vec![task.clone()]).expect("first");
        scheduler.stop();
        // No wait: schedule itself must let the old loop drain first.
        scheduler.schedule(vec![task]).expect("second");
        assert_eq!(scheduler.epochs(), 2);
        assert!(scheduler.active_loops() <= 1);
        scheduler.stop_and_wait().expect("clean stop");
    }

    #[test]
    fn oversized_rate_is_rejected_before_the_loop_starts() {
        let scheduler = Scheduler::new();
        let err = scheduler
            .schedule(vec![Task::new("huge", Duration::from_secs(u64::MAX / 2), || Ok(()))])
            .unwrap_err();
        match &err {
            SchedulerError::IntervalOverflow { task, .. } => assert_eq!(task, "huge"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(scheduler.epochs(), 0);
        assert_eq!(scheduler.active_loops(), 0);
        scheduler.wait().expect("nothing ran");
    }

    #[test]
    fn oversized_start_delay_is_rejected() {
        let scheduler = Scheduler::new();
        let task = Task::new("late", Duration::from_secs(1), || Ok(()))
            .with_start_delay(Duration::from_secs(u64::MAX / 2));
        let err = scheduler.schedule(vec![task]).unwrap_err();
        assert!(matches!(err, SchedulerError::IntervalOverflow { .. }), "got: {err}");
        assert!(!err.to_string().contains("panicked"));
    }

    #[test]
    fn overflow_inside_the_loop_is_a_typed_failure_not_a_panic() {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            state: Mutex::new(EpochState {
                active: true,
                ..EpochState::default()
            }),
            exited: Condvar::new(),
            epochs: AtomicU64::new(1),
            live_loops: AtomicUsize::new(0),
            tick: Duration::from_millis(10),
        });
        let task = Task::new("huge", Duration::from_secs(u64::MAX / 2), || Ok(()));
        run_epoch(Arc::clone(&shared), vec![task], 1);

        let state = lock(&shared.state);
        let err = state.error.as_ref().expect("terminal error");
        assert!(
            matches!(err.downcast_ref::<SchedulerError>(), Some(SchedulerError::IntervalOverflow { .. })),
            "got: {err}"
        );
        assert!(!state.active);
    }

    #[test]
    fn panicking_task_halts_the_epoch_with_an_error() {
        let scheduler = Scheduler::new();
        scheduler
            .schedule(vec![Task::new("boom", Duration::from_secs(1), || {
                panic!("task exploded")
            })])
            .expect("schedule");
        let err = scheduler.wait().unwrap_err();
        assert!(err.to_string().contains("panicked"), "got: {err}");
        assert!(!scheduler.is_running());
    }
}
