//! Handshake and frame codec.
//!
//! Wire format:
//! ```text
//! [magic:4]                         once, right after connect
//! [command line ... '\n']           per frame
//! [body_len:4 BE][body:body_len]    only for commands with a payload
//! ```

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ProtocolConfig;
use crate::protocol::command::{validate_topic, Command, PublishRequest, PUB};
use crate::protocol::error::ProtocolError;

/// Protocol magic a client sends immediately after connecting.
pub const MAGIC_V2: [u8; 4] = *b"  V2";

/// Read the 4-byte handshake and check it against [`MAGIC_V2`].
pub async fn read_handshake<R>(reader: &mut R) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .await
        .map_err(|e| ProtocolError::from_read(e, "handshake"))?;

    if magic != MAGIC_V2 {
        return Err(ProtocolError::BadHandshake {
            expected: MAGIC_V2,
            actual: magic,
        });
    }
    Ok(())
}

/// Write the handshake bytes.
pub async fn write_handshake<W>(writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&MAGIC_V2).await
}

/// Write one `PUB` frame.
pub async fn write_publish<W>(writer: &mut W, request: &PublishRequest) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&request.encode()).await
}

/// Limits applied while decoding.
#[derive(Debug, Clone, Copy)]
pub struct FrameLimits {
    pub max_line_length: usize,
    pub max_message_size: usize,
}

impl From<&ProtocolConfig> for FrameLimits {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            max_line_length: config.max_line_length,
            max_message_size: config.max_message_size,
        }
    }
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self::from(&ProtocolConfig::default())
    }
}

/// Decodes frames from a buffered reader.
///
/// The line buffer is reused between frames.
pub struct FrameReader<R> {
    reader: R,
    limits: FrameLimits,
    line: Vec<u8>,
}

impl<R> FrameReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, limits: FrameLimits) -> Self {
        Self {
            reader,
            limits,
            line: Vec::with_capacity(64),
        }
    }

    /// Read the next command.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly between frames.
    pub async fn read_command(&mut self) -> Result<Option<Command>, ProtocolError> {
        if !self.read_line().await? {
            return Ok(None);
        }

        let line = std::str::from_utf8(&self.line)
            .map_err(|_| ProtocolError::MalformedCommand("command line is not valid UTF-8".into()))?;
        let mut tokens = line.split_ascii_whitespace();
        let name = tokens
            .next()
            .ok_or_else(|| ProtocolError::MalformedCommand("empty command line".into()))?;

        match name {
            PUB => {
                let args: Vec<&str> = tokens.collect();
                if args.len() != 1 {
                    return Err(ProtocolError::InvalidArguments {
                        command: PUB,
                        expected: 1,
                        actual: args.len(),
                    });
                }
                let topic = args[0].to_string();
                validate_topic(&topic)?;

                let body = self.read_body().await?;
                Ok(Some(Command::Publish(PublishRequest::new(topic, body)?)))
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    /// Fill `self.line` with the next command line, delimiter stripped.
    ///
    /// Returns `false` on a clean EOF before the first byte.
    async fn read_line(&mut self) -> Result<bool, ProtocolError> {
        self.line.clear();

        // One extra byte so a line of exactly max_line_length plus '\n' still fits.
        let limit = (self.limits.max_line_length + 1) as u64;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut self.line)
            .await?;

        if read == 0 {
            return Ok(false);
        }

        if self.line.last() != Some(&b'\n') {
            if self.line.len() as u64 >= limit {
                return Err(ProtocolError::MalformedCommand(format!(
                    "no delimiter within {} bytes",
                    self.limits.max_line_length
                )));
            }
            return Err(ProtocolError::TruncatedFrame("command line"));
        }

        self.line.pop();
        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }
        Ok(true)
    }

    async fn read_body(&mut self) -> Result<Bytes, ProtocolError> {
        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| ProtocolError::from_read(e, "body length"))?;
        let size = u32::from_be_bytes(len_buf) as usize;

        if size == 0 {
            return Err(ProtocolError::EmptyMessage);
        }
        if size > self.limits.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size,
                max: self.limits.max_message_size,
            });
        }

        let mut body = vec![0u8; size];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(|e| ProtocolError::from_read(e, "body"))?;
        Ok(Bytes::from(body))
    }
}

/// Decode a single `PUB` frame from a complete byte slice.
pub async fn decode_publish(bytes: &[u8], limits: FrameLimits) -> Result<PublishRequest, ProtocolError> {
    let mut reader = FrameReader::new(bytes, limits);
    match reader.read_command().await? {
        Some(Command::Publish(request)) => Ok(request),
        None => Err(ProtocolError::TruncatedFrame("command line")),
    }
}
