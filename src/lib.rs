//! NSQ-style TCP front-end.
//!
//! An accept loop that hands every connection to its own task and drains
//! them on shutdown, plus the client wire protocol for publishing.

// Core subsystems
pub mod broker;
pub mod net;
pub mod protocol;

// Clients
pub mod client;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use lifecycle::{Program, Shutdown, TaskGroup};
pub use net::{serve, Acceptor, ConnectionHandler, ServeError};
