//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] completes on the first termination signal.
//! [`PoolController::run_until_signal`](crate::PoolController::run_until_signal)
//! races it against the admission loop.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`.
//! **Elsewhere:** Ctrl-C via [`tokio::signal::ctrl_c`].

/// Waits for a termination signal.
///
/// Each call installs its own listeners. Returns `Err` if they cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "termination signal received");
    Ok(())
}

/// Waits for a termination signal.
///
/// Returns `Err` if the Ctrl-C handler cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "termination signal received");
    Ok(())
}
