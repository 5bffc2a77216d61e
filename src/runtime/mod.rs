//! Single-threaded readiness runtime.
//!
//! One thread drives `ConnectionManager::tick` in a loop. Each tick is a
//! non-blocking sweep: admit at most one client, read from every ready
//! connection, dispatch responses, drop failed connections.
//!
//! Shared abstractions:
//! - `Protocol`: the line handler served to every client
//! - `ConnectionSet`: bounded, insertion-ordered registry of clients
//! - `LineBuffer`: bounded per-connection read buffer with line framing

mod broadcast;
mod buffer;
mod connection;
mod listener;
mod manager;
pub mod protocol;

pub use listener::BindError;
pub use manager::ConnectionManager;
pub use protocol::{Message, Protocol};

use crate::config::Config;
use crate::shutdown::ShutdownToken;
use tracing::info;

/// Serve `protocol` until `shutdown` is cancelled, then half-close every
/// connection and hand the protocol state back.
///
/// Only startup failures are returned; errors on individual connections are
/// handled inside each tick.
pub fn run<P: Protocol>(
    config: &Config,
    protocol: P,
    shutdown: &ShutdownToken,
) -> Result<P, BindError> {
    let mut manager = ConnectionManager::new(config, protocol)?;

    info!(
        addr = %manager.local_addr(),
        max_connections = config.max_connections,
        "Server listening"
    );

    while !shutdown.is_cancelled() {
        if manager.tick().is_idle() {
            manager.park(config.idle_wait);
        }
    }

    info!(
        connections = manager.connection_count(),
        "Shutting down all connections"
    );
    manager.shutdown_all();
    Ok(manager.into_protocol())
}
