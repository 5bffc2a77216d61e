//! Configuration module for count-server.
//!
//! The only runtime input is the TCP port, given as a positional argument.
//! Everything else is a named constant carried on the resolved `Config`.

use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Maximum number of simultaneously connected clients.
pub const MAX_CONNECTIONS: usize = 1024;

/// Upper bound in bytes for a single read and for a buffered partial line.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Pending connections the kernel may queue on the listening socket.
pub const LISTEN_BACKLOG: i32 = 1024;

/// How long the driving loop waits for readiness after a tick with no progress.
pub const IDLE_WAIT: Duration = Duration::from_millis(10);

/// Command-line arguments for the counter server
#[derive(Parser, Debug)]
#[command(name = "count-server")]
#[command(version)]
#[command(about = "A shared-counter server speaking a line-based text protocol", long_about = None)]
pub struct CliArgs {
    /// TCP port to listen on
    #[arg(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub max_connections: usize,
    pub read_buffer_size: usize,
    pub backlog: i32,
    pub idle_wait: Duration,
}

impl Config {
    /// Load configuration from the process arguments.
    ///
    /// A missing or invalid port makes clap print usage and exit the process.
    pub fn load() -> Self {
        Self::from_cli(CliArgs::parse())
    }

    /// Resolve parsed arguments into a configuration bound on all interfaces.
    pub fn from_cli(cli: CliArgs) -> Self {
        Self::with_listen(SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port)))
    }

    /// Configuration with default limits listening on `listen`.
    pub fn with_listen(listen: SocketAddr) -> Self {
        Config {
            listen,
            max_connections: MAX_CONNECTIONS,
            read_buffer_size: READ_BUFFER_SIZE,
            backlog: LISTEN_BACKLOG,
            idle_wait: IDLE_WAIT,
        }
    }
}
