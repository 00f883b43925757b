//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, error classification)
//!     → acceptor.rs (accept loop, one task per connection)
//!     → handler.rs (ConnectionHandler implemented by the broker side)
//!
//! Shutdown:
//!     broadcast fires or listener closes → stop accepting → drain tasks → return
//! ```
//!
//! # Design Decisions
//! - The acceptor never reads or writes connection bytes
//! - Each connection tracked by the task group for graceful shutdown
//! - No connection limit: the OS accept queue is the only backpressure

pub mod acceptor;
pub mod connection;
pub mod handler;
pub mod listener;

pub use acceptor::{serve, Acceptor, ServeError};
pub use connection::{ConnectionId, ConnectionInfo};
pub use handler::ConnectionHandler;
pub use listener::{bind, classify_accept_error, AcceptFailure, Listener, ListenerError};
