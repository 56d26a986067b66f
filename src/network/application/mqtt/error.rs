//! Error types for the MQTT codec and session engine.
//!
//! Failures fall into two groups. Problems with a caller's request (bad
//! arguments, operating while disconnected) are returned synchronously as
//! [`ClientError`]. Problems discovered while the engine is pumping (transport
//! failures, malformed inbound frames, keep-alive expiry) are fatal to the
//! connection and are reported once through the handler as an [`ErrorKind`].

/// Errors produced while building an outbound control packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The frame body exceeds the 268,435,455 bytes a remaining-length field can hold.
    #[error("remaining length exceeds the MQTT maximum")]
    LengthOverflow,
    /// A length-prefixed string or binary field is longer than 65,535 bytes.
    #[error("length-prefixed field exceeds 65535 bytes")]
    StringTooLong,
    /// A password was supplied without a username.
    #[error("password supplied without a username")]
    PasswordWithoutUsername,
}

/// Errors produced while decoding inbound bytes.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// The remaining-length field did not terminate within four bytes.
    #[error("remaining length field is longer than four bytes")]
    MalformedLength,
    /// The fixed header carries a reserved packet type (0 or 15).
    #[error("invalid packet type {0}")]
    InvalidPacketType(u8),
    /// A field extends past the end of the frame body.
    #[error("frame body is truncated")]
    Truncated,
    /// The frame body is inconsistent with its packet type.
    #[error("malformed packet")]
    MalformedPacket,
    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    /// Memory for the frame body could not be reserved.
    #[error("out of memory while buffering a frame")]
    OutOfMemory,
}

/// Synchronous failures of a caller-invoked engine operation.
///
/// These never reach the error callback.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError {
    /// `connect` was called while a connection is opening or open.
    #[error("client is already connected")]
    AlreadyConnected,
    /// The operation requires an open, accepted session.
    #[error("client is not connected")]
    NotConnected,
    /// The connect options carry an empty client identifier.
    #[error("client identifier must not be empty")]
    InvalidClientId,
    /// A subscribe or unsubscribe request listed no topics.
    #[error("topic list must not be empty")]
    EmptyTopicList,
    /// A topic name or filter is empty.
    #[error("topic must not be empty")]
    InvalidTopic,
    /// Packet identifier zero was used where a non-zero identifier is required.
    #[error("packet identifier must be non-zero")]
    InvalidPacketId,
    /// The packet could not be encoded.
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),
    /// The transport refused to start opening.
    #[error("transport open failed")]
    OpenFailed,
    /// The transport refused the outbound bytes.
    #[error("transport send failed")]
    SendFailed,
}

/// Fatal, asynchronous failures reported through the error callback.
///
/// After any of these the engine has closed the transport and reset its
/// protocol state; the caller must `connect` again to resume.
#[derive(Debug, PartialEq, Eq, Clone, Copy, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// The transport failed to open, reported an I/O failure, or the broker
    /// refused the connection.
    #[error("connection error")]
    ConnectionError,
    /// Sending failed after the connection was established.
    #[error("communication error")]
    CommunicationError,
    /// No PINGRESP arrived within the ping-response window.
    #[error("no ping response")]
    NoPingResponse,
    /// An inbound frame was malformed.
    #[error("parse error")]
    ParseError,
    /// Memory for an inbound frame could not be reserved.
    #[error("memory error")]
    MemoryError,
}

impl From<DecodeError> for ErrorKind {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::OutOfMemory => ErrorKind::MemoryError,
            _ => ErrorKind::ParseError,
        }
    }
}
