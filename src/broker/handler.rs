//! Connection handler speaking the client protocol.
//!
//! Reads the handshake, then decodes frames until the client hangs up, a
//! frame is invalid, or the broker starts shutting down. Any failure closes
//! only this connection.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, BufReader};
use tracing::Instrument;

use crate::broker::{Broker, BrokerError};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionHandler, ConnectionInfo};
use crate::observability::metrics;
use crate::protocol::{read_handshake, Command, FrameLimits, FrameReader, ProtocolError};

/// Why a connection ended early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Forwards decoded `PUB` frames to a [`Broker`].
#[derive(Debug)]
pub struct ProtocolHandler<B> {
    broker: Arc<B>,
    limits: FrameLimits,
    shutdown: Shutdown,
}

impl<B: Broker> ProtocolHandler<B> {
    pub fn new(broker: Arc<B>, limits: FrameLimits) -> Self {
        let shutdown = broker.shutdown_signal();
        Self {
            broker,
            limits,
            shutdown,
        }
    }

    async fn process<S>(&self, conn: S) -> Result<u64, ConnectionError>
    where
        S: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(conn);
        read_handshake(&mut reader).await?;
        tracing::debug!("Protocol V2 handshake accepted");

        let mut frames = FrameReader::new(reader, self.limits);
        let mut published = 0u64;
        while let Some(command) = frames.read_command().await? {
            let name = command.name();
            match command {
                Command::Publish(request) => {
                    tracing::trace!(
                        command = name,
                        topic = %request.topic(),
                        size = request.body().len(),
                        "Frame decoded"
                    );
                    self.broker.publish(request)?;
                    published += 1;
                }
            }
        }
        Ok(published)
    }
}

impl<B, S> ConnectionHandler<S> for ProtocolHandler<B>
where
    B: Broker,
    S: AsyncRead + Unpin + Send,
{
    async fn handle(&self, conn: S, info: ConnectionInfo) {
        let span = tracing::info_span!("connection", id = %info.id, peer = %info.peer);

        async move {
            let mut shutdown = self.shutdown.subscribe();
            if self.shutdown.is_triggered() {
                tracing::debug!("Broker exiting, dropping connection");
                return;
            }

            let outcome = tokio::select! {
                outcome = self.process(conn) => outcome,
                _ = shutdown.recv() => {
                    tracing::debug!("Broker exiting, closing connection");
                    return;
                }
            };

            match outcome {
                Ok(published) => tracing::debug!(published, "Client disconnected"),
                Err(ConnectionError::Protocol(e)) => {
                    metrics::record_protocol_error(e.kind());
                    tracing::warn!(error = %e, "Closing connection after protocol error");
                }
                Err(ConnectionError::Broker(e)) => {
                    tracing::warn!(error = %e, "Closing connection after broker error");
                }
            }
        }
        .instrument(span)
        .await
    }
}
