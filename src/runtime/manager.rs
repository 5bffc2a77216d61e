//! Connection manager: one non-blocking sweep over the listener and every
//! client per tick.
//!
//! mio readiness is edge-triggered, so readiness is recorded as flags on the
//! listener and on each connection. A flag stays set until an accept or read
//! reports `WouldBlock`. Each tick performs at most one accept and one read
//! per connection, which keeps a busy client from starving the others.

use crate::config::Config;
use crate::runtime::broadcast;
use crate::runtime::buffer::Frame;
use crate::runtime::connection::{Connection, ConnectionSet, ReadOutcome};
use crate::runtime::listener::{BindError, BindStage, Listener, LISTENER_TOKEN};
use crate::runtime::protocol::{Delivery, Message, Protocol};
use mio::{Events, Poll, Token};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// What happened during one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Clients admitted into the connection set.
    pub accepted: usize,
    /// Connections that produced bytes.
    pub reads: usize,
    /// Lines handed to the protocol.
    pub commands: usize,
    /// Connections dropped at the end of the tick.
    pub removed: usize,
}

impl TickReport {
    /// True when the tick made no progress at all.
    pub fn is_idle(&self) -> bool {
        self.accepted == 0 && self.reads == 0 && self.commands == 0 && self.removed == 0
    }
}

/// Owns the listener, the connection set and the protocol state.
pub struct ConnectionManager<P> {
    poll: Poll,
    events: Events,
    listener: Listener,
    connections: ConnectionSet,
    protocol: P,
    read_buffer_size: usize,
}

impl<P: Protocol> ConnectionManager<P> {
    /// Bind the listener described by `config` and serve `protocol` on it.
    pub fn new(config: &Config, protocol: P) -> Result<Self, BindError> {
        let poll = Poll::new().map_err(|e| BindError::new(BindStage::Poll, config.listen, e))?;
        let listener = Listener::bind(config.listen, config.backlog, poll.registry())?;

        Ok(Self {
            poll,
            events: Events::with_capacity(config.max_connections + 1),
            listener,
            connections: ConnectionSet::new(config.max_connections),
            protocol,
            read_buffer_size: config.read_buffer_size,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn into_protocol(self) -> P {
        self.protocol
    }

    /// Run one complete sweep without waiting on any socket.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.collect_readiness(Some(Duration::ZERO));

        self.admit(&mut report);

        // Admissions happen above, so the length is fixed for the sweep
        for position in 0..self.connections.len() {
            let key = self.connections.key_at(position);
            self.service(key, &mut report);
        }

        let before = self.connections.len();
        self.connections
            .retain_only(self.poll.registry(), Connection::is_alive);
        report.removed = before - self.connections.len();
        if report.removed > 0 {
            info!(
                removed = report.removed,
                connections = self.connections.len(),
                "Connections removed"
            );
        }

        report
    }

    /// Wait up to `timeout` for readiness, recording it for the next tick.
    ///
    /// Only called by the driving loop between ticks when nothing is pending.
    pub fn park(&mut self, timeout: Duration) {
        self.collect_readiness(Some(timeout));
    }

    /// Half-close every live connection and stop listening.
    pub fn shutdown_all(&mut self) {
        self.connections.shutdown_all(self.poll.registry());
        self.listener.deregister(self.poll.registry());
    }

    fn collect_readiness(&mut self, timeout: Option<Duration>) {
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() != io::ErrorKind::Interrupted {
                warn!(error = %e, "Readiness poll failed");
            }
            return;
        }

        for event in self.events.iter() {
            match event.token() {
                LISTENER_TOKEN => self.listener.mark_ready(),
                Token(key) => {
                    if let Some(conn) = self.connections.get_mut(key) {
                        conn.mark_readable();
                    }
                }
            }
        }
    }

    fn admit(&mut self, report: &mut TickReport) {
        if self.connections.is_full() {
            trace!(
                capacity = self.connections.capacity(),
                "Max connection capacity: skipped polling for new connections"
            );
            return;
        }

        let Some((stream, peer)) = self.listener.poll_for_new_client() else {
            return;
        };

        let conn = Connection::new(stream, peer, self.read_buffer_size);
        if self.connections.try_add(conn, self.poll.registry()) {
            report.accepted += 1;
            info!(peer = %peer, connections = self.connections.len(), "New connection added");
        }
    }

    fn service(&mut self, key: usize, report: &mut TickReport) {
        let Some(conn) = self.connections.get_mut(key) else {
            return;
        };

        match conn.fill() {
            ReadOutcome::Data(n) => {
                trace!(peer = %conn.peer_addr(), bytes = n, "Read from connection");
                report.reads += 1;
            }
            ReadOutcome::NotReady => return,
            ReadOutcome::Closed => {
                debug!(peer = %conn.peer_addr(), "Connection closed by client");
                conn.mark_dead();
                return;
            }
            ReadOutcome::Failed(e) => {
                warn!(peer = %conn.peer_addr(), error = %e, "Socket read failed");
                conn.mark_dead();
                return;
            }
        }

        while let Some(frame) = self.connections.get_mut(key).and_then(Connection::next_frame) {
            let message = match frame {
                Frame::Line(line) => self.protocol.handle(&line),
                Frame::Overlong => self.protocol.reject(),
            };
            report.commands += 1;

            if !self.dispatch(key, &message) {
                break;
            }
        }
    }

    /// Deliver `message` from the connection at `key`.
    ///
    /// Returns false if the sender was marked dead.
    fn dispatch(&mut self, key: usize, message: &Message) -> bool {
        match message.delivery {
            Delivery::Broadcast => {
                broadcast::send_to_all(&mut self.connections, message.as_bytes());
                self.connections
                    .get_mut(key)
                    .is_some_and(|conn| conn.is_alive())
            }
            Delivery::Unicast => {
                let Some(conn) = self.connections.get_mut(key) else {
                    return false;
                };
                match conn.send(message.as_bytes()) {
                    Ok(()) => {
                        debug!(peer = %conn.peer_addr(), message = %message.text.trim_end(), "Server sent message");
                        true
                    }
                    Err(e) => {
                        warn!(peer = %conn.peer_addr(), error = %e, "Socket send failed");
                        conn.mark_dead();
                        false
                    }
                }
            }
        }
    }
}
