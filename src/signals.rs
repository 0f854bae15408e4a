use tokio::sync::broadcast;
use tracing::{error, info};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Stop accepting work, flush what is buffered, exit
    Graceful,
}

/// Create the shutdown channel without attaching OS signals.
///
/// Tests and embedders trigger shutdown by sending on the returned sender.
pub fn shutdown_channel() -> broadcast::Sender<ShutdownSignal> {
    let (shutdown_tx, _) = broadcast::channel(16);
    shutdown_tx
}

/// Setup signal handlers for the process
///
/// Returns a broadcast sender for shutdown signals and a join handle for the
/// signal task. SIGTERM and SIGINT both trigger a graceful shutdown.
#[cfg(unix)]
pub fn setup_signal_handlers() -> std::io::Result<(
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
)> {
    let shutdown_tx = shutdown_channel();
    let tx_clone = shutdown_tx.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown");
            }
        }
        let _ = tx_clone.send(ShutdownSignal::Graceful);
    });

    Ok((shutdown_tx, handle))
}

/// Non-unix platforms only get Ctrl+C
#[cfg(not(unix))]
pub fn setup_signal_handlers() -> std::io::Result<(
    broadcast::Sender<ShutdownSignal>,
    tokio::task::JoinHandle<()>,
)> {
    let shutdown_tx = shutdown_channel();
    let tx_clone = shutdown_tx.clone();

    let handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, initiating shutdown");
                let _ = tx_clone.send(ShutdownSignal::Graceful);
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        }
    });

    Ok((shutdown_tx, handle))
}

/// True once a shutdown was broadcast or every sender is gone.
///
/// Non-blocking; used by loops that poll between units of work.
pub fn shutdown_requested(rx: &mut broadcast::Receiver<ShutdownSignal>) -> bool {
    match rx.try_recv() {
        Ok(_) => true,
        Err(broadcast::error::TryRecvError::Empty) => false,
        Err(broadcast::error::TryRecvError::Lagged(_)) => true,
        Err(broadcast::error::TryRecvError::Closed) => {
            error!("Shutdown channel closed unexpectedly, stopping");
            true
        }
    }
}
