//! Client connections and the bounded, ordered set that owns them.
//!
//! Connections are stored in a slab so a connection's key doubles as its
//! mio token. A separate key list records insertion order, which is the
//! order connections are polled and broadcast to.

use crate::runtime::buffer::{Frame, LineBuffer};
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use slab::Slab;
use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr};
use tracing::{debug, warn};

/// Outcome of a single read attempt on a connection.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes were appended to the connection's buffer.
    Data(usize),
    /// Nothing to read right now.
    NotReady,
    /// The peer closed its side.
    Closed,
    /// The read failed.
    Failed(io::Error),
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: LineBuffer,
    /// Set by readiness events, cleared once a read would block.
    readable: bool,
    alive: bool,
}

impl Connection {
    /// Wrap an accepted stream. New connections start out readable so that
    /// data which arrived before registration is not missed.
    pub fn new(stream: TcpStream, peer: SocketAddr, read_limit: usize) -> Self {
        Self {
            stream,
            peer,
            buffer: LineBuffer::new(read_limit),
            readable: true,
            alive: true,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Mark the connection for removal at the end of the current tick.
    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn mark_readable(&mut self) {
        self.readable = true;
    }

    /// Read once into the connection's buffer if it is marked readable.
    pub fn fill(&mut self) -> ReadOutcome {
        if !self.readable {
            return ReadOutcome::NotReady;
        }

        match self.buffer.read_from(&mut self.stream) {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Data(n),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.readable = false;
                ReadOutcome::NotReady
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => ReadOutcome::NotReady,
            Err(e) => ReadOutcome::Failed(e),
        }
    }

    /// Next complete frame from previously read bytes.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.buffer.next_frame()
    }

    /// Write all of `bytes` without waiting for the socket.
    ///
    /// A full send buffer is reported as `WouldBlock`, the same as any other
    /// failure: a tick never waits on a slow reader. If the failure comes
    /// after part of `bytes` went out, the peer holds a truncated line and
    /// the connection is marked dead.
    pub fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut written = 0;
        while written < bytes.len() {
            let result = match self.stream.write(&bytes[written..]) {
                Ok(0) => Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0")),
                Ok(n) => {
                    written += n;
                    continue;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };

            if written > 0 {
                debug!(peer = %self.peer, written, total = bytes.len(), "Partial write");
                self.alive = false;
            }
            return result;
        }
        Ok(())
    }

    /// Shut down only the write side, so reads still succeed but every send
    /// fails.
    #[cfg(test)]
    pub fn close_write(&self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Write)
    }

    /// Disable further reads and writes; the socket stays open until dropped.
    pub fn half_close(&self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}

/// Bounded registry of live connections with insertion-ordered iteration.
#[derive(Debug)]
pub struct ConnectionSet {
    connections: Slab<Connection>,
    order: Vec<usize>,
    capacity: usize,
}

impl ConnectionSet {
    /// Create an empty set holding at most `capacity` connections.
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: Slab::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register `conn` for read readiness and append it.
    ///
    /// Returns `false` without error when the set is full; the connection is
    /// dropped. Also returns `false` if registration fails.
    pub fn try_add(&mut self, mut conn: Connection, registry: &Registry) -> bool {
        if self.is_full() {
            return false;
        }

        let entry = self.connections.vacant_entry();
        let key = entry.key();
        if let Err(e) = registry.register(&mut conn.stream, Token(key), Interest::READABLE) {
            warn!(peer = %conn.peer, error = %e, "Failed to register connection");
            return false;
        }

        entry.insert(conn);
        self.order.push(key);
        true
    }

    /// Keep only connections matching `keep`, preserving their order.
    ///
    /// Removed connections are deregistered and closed.
    pub fn retain_only<F>(&mut self, registry: &Registry, mut keep: F)
    where
        F: FnMut(&Connection) -> bool,
    {
        let connections = &mut self.connections;
        self.order.retain(|&key| {
            if keep(&connections[key]) {
                return true;
            }
            let mut conn = connections.remove(key);
            let _ = registry.deregister(&mut conn.stream);
            debug!(peer = %conn.peer, "Connection removed");
            false
        });
    }

    /// Half-close every connection, then remove them all.
    pub fn shutdown_all(&mut self, registry: &Registry) {
        for conn in self.iter() {
            if let Err(e) = conn.half_close() {
                warn!(peer = %conn.peer, error = %e, "Failure shutting down a connection");
            }
        }
        self.retain_only(registry, |_| false);
    }

    /// Key of the connection at `position` in insertion order.
    pub fn key_at(&self, position: usize) -> usize {
        self.order[position]
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut Connection> {
        self.connections.get_mut(key)
    }

    /// Iterate connections in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.order.iter().map(|&key| &self.connections[key])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
