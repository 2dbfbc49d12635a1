//! OS signal handling.

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` on the first Ctrl+C.
///
/// Returns early, without triggering, if something else triggers shutdown first.
pub async fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    let mut stopped = shutdown.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
            }
            shutdown.trigger();
        }
        _ = stopped.recv() => {}
    }
}
