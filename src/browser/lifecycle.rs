//! Session completion tracking.
//!
//! A background task watches the browser process and the connection. When
//! either ends it tears the other down and fires the [`DoneSignal`].

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::watch;
use tracing::{debug, info};

use crate::driver::ProcessMonitor;
use crate::transport::{Connection, DisconnectReason};

// ============================================================================
// DoneSignal
// ============================================================================

/// Fires once when a session has ended.
///
/// Cheap to clone; every clone observes the same completion.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    rx: watch::Receiver<bool>,
}

impl DoneSignal {
    /// Returns `true` once the session has ended.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the session has ended.
    ///
    /// Returns immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // Err means the lifecycle task is gone, which only happens after it
        // fired or when the runtime is shutting down.
        let _ = rx.wait_for(|done| *done).await;
    }
}

// ============================================================================
// Lifecycle Task
// ============================================================================

/// Spawns the task that ends the session when the process or connection ends.
///
/// Without a `process` (attached to an external browser), completion follows
/// the connection alone.
pub(crate) fn spawn(connection: Connection, process: Option<ProcessMonitor>) -> DoneSignal {
    let (done_tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match process {
            Some(process) => {
                tokio::select! {
                    exit = process.wait() => {
                        info!(pid = process.pid(), exit = %exit, "Browser exited");
                    }
                    reason = connection.closed() => {
                        log_disconnect(reason);
                        process.kill().await;
                    }
                }
            }
            None => log_disconnect(connection.closed().await),
        }

        connection.shutdown();
        done_tx.send_replace(true);
        debug!("Session done");
    });

    DoneSignal { rx }
}

fn log_disconnect(reason: DisconnectReason) {
    match reason {
        DisconnectReason::TargetDestroyed => info!("Page target destroyed"),
        DisconnectReason::Closed => info!("Browser connection closed"),
        DisconnectReason::Shutdown => debug!("Connection shut down"),
    }
}

// ============================================================================
// Tests
// ============================================================================
