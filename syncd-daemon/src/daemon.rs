//! The sync daemon state machine.
//!
//! ```text
//! NotStarted ──run──▶ Running ──▶ Terminated(ok | error)
//!                       ▲   │
//!                       └───┘ self-reload: load → compare → reschedule
//! ```
//!
//! Every (re)load builds one scheduler task per source plus, with
//! auto-reload, a reload task. The reload task runs on the scheduler's own
//! thread and so cannot reschedule directly: on a changed configuration it
//! parks the new task set as pending and stops the epoch; `run` then
//! schedules the pending set.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use syncd_core::{build_settings, load_config_file, ConfigFile, SourceSettings};
use syncd_scheduler::{BoxError, Scheduler, Task};
use syncd_sync::RuleEvaluator;

use crate::error::DaemonError;
use crate::options::DaemonOptions;

/// Handle to a sync daemon. Clones share the same daemon.
#[derive(Clone)]
pub struct SyncDaemon {
    inner: Arc<Inner>,
}

struct Inner {
    options: DaemonOptions,
    scheduler: Scheduler,
    evaluator: RuleEvaluator,
    running: AtomicBool,
    /// Set by the first `run`; a daemon runs at most once.
    started: AtomicBool,
    shutdown: AtomicBool,
    state: Mutex<ReloadState>,
}

#[derive(Default)]
struct ReloadState {
    /// Configuration the current task set was built from.
    active: Option<ConfigFile>,
    /// Task set waiting for the current epoch to drain.
    pending: Option<Vec<Task>>,
}

impl SyncDaemon {
    pub fn new(options: DaemonOptions) -> Self {
        let evaluator = RuleEvaluator::new().with_backoff(options.retry_backoff);
        Self {
            inner: Arc::new(Inner {
                options,
                scheduler: Scheduler::new(),
                evaluator,
                running: AtomicBool::new(false),
                started: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                state: Mutex::new(ReloadState::default()),
            }),
        }
    }

    /// Load the configuration, schedule it and block until the daemon ends.
    ///
    /// Returns `Ok(())` after [`SyncDaemon::stop`], or the error that halted
    /// the scheduler. A daemon runs once: calling `run` again after it
    /// returned fails with [`DaemonError::Terminated`].
    pub fn run(&self) -> Result<(), DaemonError> {
        let inner = &self.inner;
        if inner.running.swap(true, Ordering::SeqCst) {
            return Err(DaemonError::AlreadyRunning);
        }
        let _running = RunningGuard(&inner.running);
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(DaemonError::Terminated);
        }

        let Some(mut tasks) = Inner::reload(&self.inner)? else {
            return Ok(());
        };

        loop {
            if inner.shutdown.load(Ordering::SeqCst) {
                return Ok(());
            }
            inner.scheduler.schedule(tasks)?;
            if inner.shutdown.load(Ordering::SeqCst) {
                inner.scheduler.stop();
            }

            inner.scheduler.wait()?;

            let pending = inner.lock_state().pending.take();
            match pending {
                Some(next) if !inner.shutdown.load(Ordering::SeqCst) => {
                    tracing::info!(epoch = inner.scheduler.epochs() + 1, "rescheduling with reloaded configuration");
                    tasks = next;
                }
                _ => {
                    tracing::info!("sync daemon stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Request a clean shutdown; `run` returns `Ok(())` once the current task
    /// finishes. Never blocks.
    pub fn stop(&self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.lock_state().pending = None;
        self.inner.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// The configuration currently scheduled, if any.
    pub fn active_config(&self) -> Option<ConfigFile> {
        self.inner.lock_state().active.clone()
    }
}

impl Inner {
    /// Load the configuration and, if it differs from the active one, build
    /// the task set for it. `None` means nothing changed.
    fn reload(this: &Arc<Self>) -> Result<Option<Vec<Task>>, DaemonError> {
        let path = &this.options.config_path;
        let config = load_config_file(path)?;

        let mut state = this.lock_state();
        match &state.active {
            Some(active) if *active == config => {
                tracing::info!(path = %path.display(), "configuration unchanged, keeping current schedule");
                return Ok(None);
            }
            Some(_) => {
                tracing::info!(path = %path.display(), "configuration changed, rescheduling");
            }
            None => {
                tracing::info!(
                    path = %path.display(),
                    sources = config.sources.len(),
                    rules = config.rules.len(),
                    "configuration loaded",
                );
            }
        }

        let settings = build_settings(&config, &this.options.registry)?;
        let tasks = this.build_tasks(settings, Arc::downgrade(this));
        state.active = Some(config);
        Ok(Some(tasks))
    }

    fn build_tasks(&self, settings: Vec<SourceSettings>, weak: Weak<Self>) -> Vec<Task> {
        let mut tasks: Vec<Task> = settings
            .into_iter()
            .map(|source| {
                let evaluator = self.evaluator.clone();
                let rate = source.poll_interval;
                Task::new(format!("source:{}", source.id), rate, move || {
                    evaluator.sync_source(&source).map_err(BoxError::from)
                })
            })
            .collect();

        if self.options.auto_reload {
            let interval = self.options.reload_interval;
            tasks.push(
                Task::new("config-reload", interval, move || self_reload(&weak))
                    .with_start_delay(interval),
            );
        }
        tasks
    }

    fn lock_state(&self) -> MutexGuard<'_, ReloadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of the self-reload task.
fn self_reload(weak: &Weak<Inner>) -> Result<(), BoxError> {
    let Some(inner) = weak.upgrade() else {
        return Ok(());
    };
    if let Some(tasks) = Inner::reload(&inner)? {
        inner.lock_state().pending = Some(tasks);
        inner.scheduler.stop();
    }
    Ok(())
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
