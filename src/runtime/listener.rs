//! Listening socket for new client connections.
//!
//! The socket is built with socket2 so address reuse and the backlog can be
//! set before listening, then handed to mio for readiness notifications.

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Token reserved for the listening socket.
pub const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Acknowledgment sent to every accepted client.
pub const ACCEPTED_BANNER: &[u8] = b"---Connection Accepted---\r\n";

/// Startup step that failed while building the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStage {
    Poll,
    Socket,
    Options,
    Bind,
    Listen,
    Register,
}

impl fmt::Display for BindStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            BindStage::Poll => "poll",
            BindStage::Socket => "socket",
            BindStage::Options => "socket options",
            BindStage::Bind => "bind",
            BindStage::Listen => "listen",
            BindStage::Register => "register",
        };
        f.write_str(stage)
    }
}

/// Fatal error raised before the server can start serving.
#[derive(Debug)]
pub struct BindError {
    stage: BindStage,
    addr: SocketAddr,
    source: io::Error,
}

impl BindError {
    pub fn new(stage: BindStage, addr: SocketAddr, source: io::Error) -> Self {
        Self {
            stage,
            addr,
            source,
        }
    }

    pub fn stage(&self) -> BindStage {
        self.stage
    }
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Server {} failure on {}: {}",
            self.stage, self.addr, self.source
        )
    }
}

impl std::error::Error for BindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Listening socket registered with a mio registry.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    /// Set by readiness events, cleared once accept would block.
    ready: bool,
}

impl Listener {
    /// Create, configure, bind and register the listening socket.
    pub fn bind(addr: SocketAddr, backlog: i32, registry: &Registry) -> Result<Self, BindError> {
        let fail = |stage| move |e| BindError::new(stage, addr, e);

        let socket = socket2::Socket::new(
            socket2::Domain::for_address(addr),
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )
        .map_err(fail(BindStage::Socket))?;

        socket
            .set_reuse_address(true)
            .map_err(fail(BindStage::Options))?;
        socket
            .set_nonblocking(true)
            .map_err(fail(BindStage::Options))?;
        socket.bind(&addr.into()).map_err(fail(BindStage::Bind))?;
        socket.listen(backlog).map_err(fail(BindStage::Listen))?;

        let std_listener: std::net::TcpListener = socket.into();
        let local_addr = std_listener
            .local_addr()
            .map_err(fail(BindStage::Bind))?;

        let mut inner = TcpListener::from_std(std_listener);
        registry
            .register(&mut inner, LISTENER_TOKEN, Interest::READABLE)
            .map_err(fail(BindStage::Register))?;

        Ok(Self {
            inner,
            local_addr,
            ready: true,
        })
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Accept at most one pending client and acknowledge it.
    ///
    /// Never blocks. Returns `None` when nothing is pending, when the client
    /// went away before it could be accepted, or when the acknowledgment
    /// could not be sent.
    pub fn poll_for_new_client(&mut self) -> Option<(TcpStream, SocketAddr)> {
        if !self.ready {
            return None;
        }

        let (stream, peer) = match self.inner.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.ready = false;
                return None;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return None,
            Err(e) => {
                warn!(error = %e, "New client acceptance failed");
                return None;
            }
        };

        if let Err(e) = io::Write::write_all(&mut &stream, ACCEPTED_BANNER) {
            warn!(peer = %peer, error = %e, "New client send failed");
            return None;
        }

        debug!(peer = %peer, "Accepted connection");
        Some((stream, peer))
    }

    /// Deregister the socket from `registry`.
    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.inner);
    }
}
