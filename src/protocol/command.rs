//! Parsed commands and their encoders.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::error::ProtocolError;

/// Command name for a publish.
pub const PUB: &str = "PUB";

/// Longest topic name accepted, in bytes.
pub const MAX_TOPIC_LENGTH: usize = 64;

/// A single decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `PUB <topic>\n<len><body>`
    Publish(PublishRequest),
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Publish(_) => PUB,
        }
    }
}

/// Semantic payload of a `PUB` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    topic: String,
    body: Bytes,
}

impl PublishRequest {
    /// Build a validated publish request.
    pub fn new(topic: impl Into<String>, body: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let topic = topic.into();
        validate_topic(&topic)?;
        let body = body.into();
        if body.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        body_length(body.len())?;
        Ok(Self { topic, body })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_parts(self) -> (String, Bytes) {
        (self.topic, self.body)
    }

    /// Encode this request as a complete `PUB` frame.
    pub fn encode(&self) -> Bytes {
        // Length was checked in `new`.
        frame(&self.topic, &self.body, self.body.len() as u32)
    }
}

/// Check a topic name: non-empty, bounded, no whitespace or control characters.
pub fn validate_topic(topic: &str) -> Result<(), ProtocolError> {
    let valid = !topic.is_empty()
        && topic.len() <= MAX_TOPIC_LENGTH
        && !topic.chars().any(|c| c.is_whitespace() || c.is_control());

    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidTopic(topic.to_string()))
    }
}

/// Encode a publish frame: `PUB <topic>\n`, the 4-byte big-endian body length, the body.
///
/// The topic is written as-is. Callers that cannot vouch for it should go
/// through [`PublishRequest::new`] first. Fails only when the body is too long
/// for the length prefix.
pub fn encode_publish(topic: &str, body: &[u8]) -> Result<Bytes, ProtocolError> {
    let len = body_length(body.len())?;
    Ok(frame(topic, body, len))
}

/// Body length as it goes on the wire.
pub(crate) fn body_length(len: usize) -> Result<u32, ProtocolError> {
    u32::try_from(len).map_err(|_| ProtocolError::MessageTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

fn frame(topic: &str, body: &[u8], len: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(PUB.len() + topic.len() + 2 + 4 + body.len());
    buf.put_slice(PUB.as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(topic.as_bytes());
    buf.put_u8(b'\n');
    buf.put_u32(len);
    buf.put_slice(body);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_publish_matches_wire_layout() {
        let encoded = encode_publish("topic-hello", b"welcome").unwrap();

        let mut expected = b"PUB topic-hello\n".to_vec();
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x07]);
        expected.extend_from_slice(b"welcome");

        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn publish_request_rejects_bad_topics() {
        let too_long = "x".repeat(MAX_TOPIC_LENGTH + 1);
        for topic in ["", "has space", "tab\there", "new\nline", too_long.as_str()] {
            let err = PublishRequest::new(topic, "body").unwrap_err();
            assert!(matches!(err, ProtocolError::InvalidTopic(_)), "topic {topic:?}");
        }
    }

    #[test]
    fn publish_request_rejects_empty_body() {
        let err = PublishRequest::new("events", Bytes::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::EmptyMessage));
    }

    #[test]
    fn body_length_fits_the_prefix() {
        assert_eq!(body_length(7).unwrap(), 7);
        assert_eq!(body_length(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn body_longer_than_prefix_is_too_large() {
        let len = u32::MAX as usize + 1;
        let err = body_length(len).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MessageTooLarge { size, max } if size == len && max == u32::MAX as usize
        ));
    }

    #[test]
    fn request_encoding_matches_free_encoder() {
        let req = PublishRequest::new("topic-hello", "welcome").unwrap();
        assert_eq!(req.encode(), encode_publish("topic-hello", b"welcome").unwrap());
        assert_eq!(Command::Publish(req).name(), PUB);
    }

    #[test]
    fn max_length_topic_is_accepted() {
        let topic = "t".repeat(MAX_TOPIC_LENGTH);
        let req = PublishRequest::new(topic.clone(), "x").unwrap();
        assert_eq!(req.topic(), topic);
    }
}
