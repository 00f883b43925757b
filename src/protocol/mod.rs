//! Client wire protocol.
//!
//! # Data Flow
//! ```text
//! TCP bytes
//!     → codec.rs (handshake check, command line, length-prefixed body)
//!     → command.rs (Command / PublishRequest, topic validation)
//!     → broker
//! ```
//!
//! # Design Decisions
//! - One request shape only: command line plus optional body
//! - Limits are checked before any allocation sized by the peer
//! - Errors never outlive the connection that produced them

pub mod codec;
pub mod command;
pub mod error;

pub use codec::{read_handshake, write_handshake, write_publish, FrameLimits, FrameReader, MAGIC_V2};
pub use command::{encode_publish, Command, PublishRequest};
pub use error::ProtocolError;
