use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Error type returned by task actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Action = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// A periodic unit of work. Immutable once built.
#[derive(Clone)]
pub struct Task {
    name: String,
    action: Action,
    rate: Duration,
    start_delay: Duration,
}

impl Task {
    /// A task fired every `rate`, first on the tick right after scheduling.
    pub fn new<F>(name: impl Into<String>, rate: Duration, action: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
            rate,
            start_delay: Duration::ZERO,
        }
    }

    /// Hold back the first run until `delay` has elapsed.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub(crate) fn run(&self) -> Result<(), BoxError> {
        (self.action)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("rate", &self.rate)
            .field("start_delay", &self.start_delay)
            .finish_non_exhaustive()
    }
}
