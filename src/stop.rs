//! Stop Signal and Shutdown Coordinator
//!
//! ```text
//! SIGINT / SIGTERM ──► coordinate_shutdown ──► StopSignal::close (once)
//!                                                   │
//!                        ┌──────────────────────────┼──────────────────────────┐
//!                        ▼                          ▼                          ▼
//!                 TargetMonitor-1            TargetMonitor-2     ...    TargetMonitor-N
//!              (observed at the next wait step, never mid-probe)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::output::Reporter;

/// Broadcast-once stop token shared by the coordinator and every monitor.
///
/// Starts open, closes exactly once and never reopens. Closing an already
/// closed signal is a no-op. The token alone is the closed state; `first_close`
/// only decides which caller of [`StopSignal::close`] acknowledges it, since
/// `CancellationToken::cancel` does not report whether it did anything.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    first_close: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the signal. Returns `true` only for the call that actually
    /// performed the transition.
    pub fn close(&self) -> bool {
        let first = !self.first_close.swap(true, Ordering::SeqCst);
        self.token.cancel();
        first
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has been closed; immediately if it already is.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// Forwards operator termination requests (interrupt, terminate) into a
/// channel consumed by [`coordinate_shutdown`].
pub fn termination_requests() -> Result<mpsc::Receiver<&'static str>> {
    let (tx, rx) = mpsc::channel(4);

    let interrupt_tx = tx.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_tx.send("interrupt").await.is_err() {
                break;
            }
        }
    });

    #[cfg(unix)]
    {
        use anyhow::Context;
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::spawn(async move {
            while terminate.recv().await.is_some() {
                if tx.send("terminate").await.is_err() {
                    break;
                }
            }
        });
    }

    #[cfg(not(unix))]
    drop(tx);

    Ok(rx)
}

/// Closes `stop` on the first request and acknowledges it. Later requests
/// are ignored. Returns when the request channel is closed.
#[instrument(skip_all)]
pub async fn coordinate_shutdown(
    mut requests: mpsc::Receiver<&'static str>,
    stop: StopSignal,
    reporter: Reporter,
) {
    while let Some(signal) = requests.recv().await {
        if stop.close() {
            info!("received {signal} signal, stopping all target monitors");
            reporter.note(&format!("\nreceived {signal} signal, terminating"));
        } else {
            debug!("received {signal} signal while already stopping, ignoring");
        }
    }
}
