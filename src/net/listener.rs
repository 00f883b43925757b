//! TCP listener binding and accept-error classification.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Abstract "accept the next connection" so the accept loop can run
//!   against any stream source
//! - Decide whether an accept failure is transient, a deliberate close, or fatal

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;

/// Error type for listener setup.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address is not a socket address.
    #[error("Invalid bind address {address:?}: {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[from] io::Error),
}

/// A source of inbound connections.
pub trait Listener: Send + 'static {
    /// The stream type produced by [`accept`](Listener::accept).
    type Conn: Send + 'static;

    /// The address this listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Wait for and accept the next inbound connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Conn, SocketAddr)>> + Send + '_;
}

impl Listener for TcpListener {
    type Conn = TcpStream;

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send + '_ {
        TcpListener::accept(self)
    }
}

/// Bind a TCP listener to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|source| ListenerError::Address {
            address: config.bind_address.clone(),
            source,
        })?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}

/// How the accept loop should react to a failed accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptFailure {
    /// Recoverable; retry after yielding.
    Transient,
    /// The listener was closed on purpose; stop accepting.
    Closed,
    /// Anything else; stop and report.
    Fatal,
}

impl AcceptFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptFailure::Transient => "transient",
            AcceptFailure::Closed => "closed",
            AcceptFailure::Fatal => "fatal",
        }
    }
}

const CLOSED_SIGNATURES: [&str; 2] = ["use of closed network connection", "listener closed"];

#[cfg(target_os = "linux")]
const ENOBUFS: i32 = 105;
#[cfg(all(unix, not(target_os = "linux")))]
const ENOBUFS: i32 = 55;

// ENOMEM, ENFILE, EMFILE, ENOBUFS
#[cfg(unix)]
const EXHAUSTION_ERRNOS: [i32; 4] = [12, 23, 24, ENOBUFS];

#[cfg(not(unix))]
const EXHAUSTION_ERRNOS: [i32; 0] = [];

/// Classify an accept error.
pub fn classify_accept_error(err: &io::Error) -> AcceptFailure {
    use io::ErrorKind::*;

    if let Some(code) = err.raw_os_error() {
        if EXHAUSTION_ERRNOS.contains(&code) {
            return AcceptFailure::Transient;
        }
    }

    match err.kind() {
        ConnectionAborted | ConnectionReset | Interrupted | WouldBlock | TimedOut | OutOfMemory => {
            AcceptFailure::Transient
        }
        NotConnected => AcceptFailure::Closed,
        _ => {
            let message = err.to_string();
            if CLOSED_SIGNATURES.iter().any(|sig| message.contains(sig)) {
                AcceptFailure::Closed
            } else {
                AcceptFailure::Fatal
            }
        }
    }
}
