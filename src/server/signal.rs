// Signal handling module
//
// Supported signals:
// - SIGHUP:  Rebuild without waiting for a source change
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;

use tokio::sync::Notify;

use crate::bundler::Bundler;
use crate::logger;

/// Start signal handlers (Unix)
///
/// Handlers are registered before this returns, so a registration failure
/// is reported to the caller. Shutdown uses `notify_one` so a signal that
/// arrives before the accept loop waits is not lost.
///
/// | Signal  | Action            |
/// |---------|-------------------|
/// | SIGHUP  | Rebuild           |
/// | SIGTERM | Graceful stop     |
/// | SIGINT  | Graceful stop     |
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>, bundler: Arc<Bundler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    logger::log_rebuild_requested("SIGHUP");
                    // Failures are logged and recorded by the bundler
                    let _ = bundler.bundle().await;
                }

                _ = sigterm.recv() => {
                    logger::log_shutdown("SIGTERM");
                    shutdown.notify_one();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_shutdown("SIGINT");
                    shutdown.notify_one();
                    break;
                }
            }
        }
    });
    Ok(())
}

/// Non-Unix fallback: only Ctrl+C, no rebuild signal
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>, _bundler: Arc<Bundler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_shutdown("Ctrl+C");
            shutdown.notify_one();
        }
    });
    Ok(())
}
