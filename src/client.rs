//! Minimal publishing client.

use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::protocol::{write_handshake, write_publish, ProtocolError, PublishRequest};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid publish: {0}")]
    Invalid(#[from] ProtocolError),
}

/// A connection that has completed the handshake and can publish.
#[derive(Debug)]
pub struct Publisher {
    stream: BufWriter<TcpStream>,
}

impl Publisher {
    /// Connect and send the protocol magic.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;

        let mut stream = BufWriter::new(stream);
        write_handshake(&mut stream).await?;
        stream.flush().await?;

        tracing::debug!(peer = %peer, "Connected");
        Ok(Self { stream })
    }

    /// Publish one message.
    ///
    /// The topic is validated locally so a bad name never reaches the server.
    pub async fn publish(&mut self, topic: &str, body: impl Into<bytes::Bytes>) -> Result<(), ClientError> {
        let request = PublishRequest::new(topic, body)?;
        write_publish(&mut self.stream, &request).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Flush and half-close the connection.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
