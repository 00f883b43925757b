//! Protocol error taxonomy.
//!
//! Every variant is scoped to a single connection: the handler logs it and
//! closes that connection. Nothing here ever reaches the accept loop.

use thiserror::Error;

/// Errors produced while reading or validating client frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The first four bytes did not match the protocol magic.
    #[error("bad handshake: expected {expected:?}, got {actual:?}")]
    BadHandshake { expected: [u8; 4], actual: [u8; 4] },

    /// The command line was unterminated within the length limit, empty, or not text.
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    /// The command name is not one this server understands.
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    /// The command carried the wrong number of arguments.
    #[error("invalid arguments for {command}: expected {expected}, got {actual}")]
    InvalidArguments {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The topic name is empty, too long, or contains whitespace/control characters.
    #[error("invalid topic name {0:?}")]
    InvalidTopic(String),

    /// The connection ended partway through a frame.
    #[error("truncated frame while reading {0}")]
    TruncatedFrame(&'static str),

    /// The declared body length exceeds the configured maximum.
    #[error("message too large: {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// The declared body length was zero.
    #[error("empty message body")]
    EmptyMessage,

    /// Any other transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Short, stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::BadHandshake { .. } => "bad_handshake",
            ProtocolError::MalformedCommand(_) => "malformed_command",
            ProtocolError::UnknownCommand(_) => "unknown_command",
            ProtocolError::InvalidArguments { .. } => "invalid_arguments",
            ProtocolError::InvalidTopic(_) => "invalid_topic",
            ProtocolError::TruncatedFrame(_) => "truncated_frame",
            ProtocolError::MessageTooLarge { .. } => "message_too_large",
            ProtocolError::EmptyMessage => "empty_message",
            ProtocolError::Io(_) => "io",
        }
    }

    /// Map a read error, turning premature EOF into [`ProtocolError::TruncatedFrame`].
    pub(crate) fn from_read(err: std::io::Error, what: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::TruncatedFrame(what)
        } else {
            ProtocolError::Io(err)
        }
    }
}
