//! Fan-out of a message to every live connection.

use crate::runtime::connection::ConnectionSet;
use tracing::{debug, warn};

/// Delivery counts for one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Send `message` to every live connection in insertion order.
///
/// A failed send is logged and skipped. The connection is left in the set
/// and its next read decides whether it is removed, unless part of the
/// message was already written; then it is marked dead.
pub fn send_to_all(connections: &mut ConnectionSet, message: &[u8]) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for position in 0..connections.len() {
        let key = connections.key_at(position);
        let Some(conn) = connections.get_mut(key).filter(|conn| conn.is_alive()) else {
            continue;
        };
        match conn.send(message) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(peer = %conn.peer_addr(), error = %e, "Failure sending message to a connection");
                report.failed += 1;
            }
        }
    }

    debug!(
        delivered = report.delivered,
        failed = report.failed,
        message = %String::from_utf8_lossy(message).trim_end(),
        "Broadcast sent"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::connection::Connection;
    use mio::net::TcpStream;
    use mio::Poll;
    use std::io::{BufRead, BufReader};
    use std::net::{TcpListener as StdTcpListener, TcpStream as StdTcpStream};
    use std::time::Duration;

    fn populate(set: &mut ConnectionSet, poll: &Poll, count: usize) -> Vec<BufReader<StdTcpStream>> {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let mut clients = Vec::new();
        for _ in 0..count {
            let client = StdTcpStream::connect(listener.local_addr().unwrap()).unwrap();
            client
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let (server, peer) = listener.accept().unwrap();
            server.set_nonblocking(true).unwrap();
            let conn = Connection::new(TcpStream::from_std(server), peer, 1024);
            assert!(set.try_add(conn, poll.registry()));
            clients.push(BufReader::new(client));
        }
        clients
    }

    fn read_line(client: &mut BufReader<StdTcpStream>) -> String {
        let mut line = String::new();
        client.read_line(&mut line).unwrap();
        line
    }

    #[test]
    fn test_every_connection_receives() {
        let poll = Poll::new().unwrap();
        let mut set = ConnectionSet::new(8);
        let mut clients = populate(&mut set, &poll, 3);

        let report = send_to_all(&mut set, b"Increased by 5 (Current Count: 5)\r\n");
        assert_eq!(report, BroadcastReport { delivered: 3, failed: 0 });

        for client in &mut clients {
            assert_eq!(read_line(client), "Increased by 5 (Current Count: 5)\r\n");
        }
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let poll = Poll::new().unwrap();
        let mut set = ConnectionSet::new(8);
        let mut clients = populate(&mut set, &poll, 3);

        set.iter().nth(1).unwrap().half_close().unwrap();

        let report = send_to_all(&mut set, b"Decreased by 1 (Current Count: -1)\r\n");
        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(set.len(), 3);

        assert_eq!(read_line(&mut clients[0]), "Decreased by 1 (Current Count: -1)\r\n");
        assert_eq!(read_line(&mut clients[2]), "Decreased by 1 (Current Count: -1)\r\n");
    }

    #[test]
    fn test_skips_connections_marked_dead() {
        let poll = Poll::new().unwrap();
        let mut set = ConnectionSet::new(8);
        let _clients = populate(&mut set, &poll, 2);

        let key = set.key_at(0);
        set.get_mut(key).unwrap().mark_dead();

        let report = send_to_all(&mut set, b"Increased by 1 (Current Count: 1)\r\n");
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
    }

    #[test]
    fn test_truncated_delivery_marks_dead() {
        let poll = Poll::new().unwrap();
        let mut set = ConnectionSet::new(8);
        let _clients = populate(&mut set, &poll, 2);

        // Neither client reads, so each send stops partway through
        let message = vec![b'7'; 64 << 20];
        let report = send_to_all(&mut set, &message);
        assert_eq!(report, BroadcastReport { delivered: 0, failed: 2 });
        assert!(set.iter().all(|conn| !conn.is_alive()));

        // Later broadcasts skip them instead of appending to a broken line
        let report = send_to_all(&mut set, b"Increased by 1 (Current Count: 1)\r\n");
        assert_eq!(report, BroadcastReport { delivered: 0, failed: 0 });
    }
}
