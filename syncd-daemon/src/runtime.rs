use tokio::sync::broadcast;

use crate::daemon::SyncDaemon;
use crate::error::{io_err, DaemonError};
use crate::options::DaemonOptions;

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    init_tracing(&options.log_level);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run the daemon until it stops on its own or a shutdown signal arrives.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let daemon = SyncDaemon::new(options);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);

    let worker_handle = {
        let daemon = daemon.clone();
        let shutdown = shutdown_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = daemon.run();
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = tokio::spawn(signal_task(daemon, shutdown_rx));

    let (worker_result, signal_result) = tokio::join!(worker_handle, signal_handle);
    handle_join("sync_daemon", worker_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Stop `daemon` on the first shutdown signal, or return once the worker ends.
async fn signal_task(
    daemon: SyncDaemon,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    tokio::select! {
        _ = shutdown_rx.recv() => Ok(()),
        signal = shutdown_signal() => {
            daemon.stop();
            let name = signal?;
            tracing::info!(signal = name, "received shutdown signal, sync daemon stopping");
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())
        .map_err(|err| DaemonError::Signal(format!("SIGTERM handler failed: {err}")))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| DaemonError::Signal(format!("ctrl-c handler failed: {err}")))?;
            Ok("ctrl-c")
        }
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| DaemonError::Signal(format!("ctrl-c handler failed: {err}")))?;
    Ok("ctrl-c")
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Join(format!("{task} task failed: {err}"))),
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over
/// `default_level`; a second call is a no-op.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn run_surfaces_config_errors_from_the_worker() {
        let dir = TempDir::new().expect("tempdir");
        let options = DaemonOptions::new(dir.path().join("absent.yaml"), false);
        let err = run(options).await.unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)), "got: {err}");
    }

    #[tokio::test]
    async fn join_failure_names_the_task() {
        let handle = tokio::spawn(async { panic!("worker exploded") });
        let result: Result<Result<(), DaemonError>, _> = handle.await;
        let err = handle_join("sync_daemon", result).unwrap_err();
        assert!(err.to_string().contains("sync_daemon task failed"), "got: {err}");
    }
}
