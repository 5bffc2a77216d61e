//! Shutdown signalling.
//!
//! The server loop polls a `ShutdownToken` between ticks. A dedicated thread
//! running a small tokio runtime waits for SIGTERM or SIGINT and cancels the
//! token; the loop then finishes its current tick and shuts down.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;

/// Cancellation flag shared between the signal boundary and the server loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cancel `token` when the process receives a termination signal.
///
/// Signal handlers are installed before this returns, so a signal arriving
/// right after startup is not lost.
pub fn listen_for_signals(token: ShutdownToken) -> io::Result<thread::JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = runtime.block_on(async {
            Ok::<_, io::Error>((
                signal(SignalKind::terminate())?,
                signal(SignalKind::interrupt())?,
            ))
        })?;

        thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    tokio::select! {
                        _ = sigterm.recv() => info!("Received SIGTERM"),
                        _ = sigint.recv() => info!("Received SIGINT"),
                    }
                });
                token.cancel();
            })
    }

    #[cfg(not(unix))]
    {
        thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                    info!("Received Ctrl+C");
                }
                token.cancel();
            })
    }
}
