//! count-server: a shared counter over TCP
//!
//! Every connected client can change one server-side integer:
//! - `INCR <n>` / `DECR <n>` change the count and broadcast the result
//! - `OUTPUT` reports the count to the requester
//!
//! Features:
//! - Up to 1024 simultaneous clients on a single thread
//! - Non-blocking readiness polling (epoll on Linux, kqueue on macOS)
//! - Graceful shutdown on SIGTERM/SIGINT

mod config;
mod protocols;
mod runtime;
mod shutdown;

use config::Config;
use protocols::counter::CounterProtocol;
use shutdown::ShutdownToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_connections = config.max_connections,
        read_buffer_size = config.read_buffer_size,
        "Starting count-server"
    );

    let token = ShutdownToken::new();
    let _signals = shutdown::listen_for_signals(token.clone())?;

    let counter = match runtime::run(&config, CounterProtocol::new(), &token) {
        Ok(counter) => counter,
        Err(e) => {
            error!(stage = %e.stage(), error = %e, "Server failed to start");
            return Err(e.into());
        }
    };

    info!(count = counter.count(), "Server shutdown complete");
    Ok(())
}
