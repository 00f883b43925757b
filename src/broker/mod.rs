//! Broker engine interface and the in-memory stand-in.
//!
//! # Data Flow
//! ```text
//! acceptor → handler.rs (handshake, frames) → Broker::publish
//!                                               → memory.rs (topics, queues)
//! startup  → Broker::load_metadata / persist_metadata → metadata.rs (nsqd.dat)
//! stop     → Broker::exit → persist + shutdown broadcast
//! ```
//!
//! # Design Decisions
//! - The acceptor only knows `ConnectionHandler`; everything broker-shaped lives here
//! - Only topic metadata is persisted, never messages

pub mod handler;
pub mod memory;
pub mod metadata;

use thiserror::Error;

use crate::lifecycle::Shutdown;
use crate::protocol::PublishRequest;

pub use handler::ProtocolHandler;
pub use memory::MemoryBroker;

/// Errors raised by a broker engine.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("metadata I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata format error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("broker is exiting")]
    Exiting,
}

/// The engine a connection handler forwards requests to.
pub trait Broker: Send + Sync + 'static {
    /// Accept one message for a topic, creating the topic if needed.
    fn publish(&self, request: PublishRequest) -> Result<(), BrokerError>;

    /// Restore persisted metadata. A missing file is not an error.
    fn load_metadata(&self) -> Result<(), BrokerError>;

    /// Write current metadata to disk.
    fn persist_metadata(&self) -> Result<(), BrokerError>;

    /// Shut the engine down. Safe to call more than once.
    fn exit(&self);

    /// Signal that fires when the engine starts shutting down.
    fn shutdown_signal(&self) -> Shutdown;
}
