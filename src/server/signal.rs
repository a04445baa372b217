// Signal handling module
//
// Supported signals:
// - SIGHUP:  Drop every cached handler module
// - SIGTERM: Shutdown (connections are severed, no drain)
// - SIGINT:  Shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;
use crate::modules::{ModuleRegistry, ScriptModule};

/// Start signal handlers (Unix only)
///
/// Registration happens before this returns, so a failure is reported to the
/// caller instead of being lost in the background task.
#[cfg(unix)]
pub fn start_signal_handler(
    shutdown: Arc<Notify>,
    registry: Arc<ModuleRegistry<ScriptModule>>,
) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    let dropped = registry.clear();
                    logger::log_info(&format!(
                        "SIGHUP received, dropped {dropped} cached handler modules"
                    ));
                }

                _ = sigterm.recv() => {
                    logger::log_info("SIGTERM received, shutting down");
                    shutdown.notify_one();
                    break;
                }

                _ = sigint.recv() => {
                    logger::log_info("SIGINT received, shutting down");
                    shutdown.notify_one();
                    break;
                }
            }
        }
    });
    Ok(())
}

/// Fallback for other platforms - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(
    shutdown: Arc<Notify>,
    _registry: Arc<ModuleRegistry<ScriptModule>>,
) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("Ctrl+C received, shutting down");
            shutdown.notify_one();
        }
    });
    Ok(())
}
