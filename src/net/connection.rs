//! Per-connection identity.
//!
//! Connections carry no state of their own in the accept loop; the id only
//! ties together log lines emitted by the acceptor and the handler.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough since only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What the acceptor knows about a connection when it hands it off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: SocketAddr,
}

impl ConnectionInfo {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: ConnectionId::next(),
            peer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique_and_increasing() {
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let a = ConnectionInfo::new(peer);
        let b = ConnectionInfo::new(peer);
        assert_ne!(a.id, b.id);
        assert!(b.id.as_u64() > a.id.as_u64());
        assert!(a.id.to_string().starts_with("conn-"));
    }
}
