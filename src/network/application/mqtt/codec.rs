//! MQTT 3.1.1 wire format.
//!
//! The encoders turn typed fields into complete frames ready to hand to a
//! transport. The [`Decoder`] works the other way: it accepts inbound bytes in
//! chunks of any size and yields a [`DecodedPacket`] each time a frame is
//! complete. It only splits frames; interpreting a frame body is left to
//! [`Packet::from_frame`](super::packet::Packet::from_frame).
//!
//! ```rust
//! use libiot_mqtt::network::application::mqtt::codec::{self, Decoder, PacketType};
//! use libiot_mqtt::network::application::mqtt::QoS;
//!
//! let frame = codec::encode_publish(QoS::AtLeastOnce, false, false, 10, "a/b", b"hi").unwrap();
//! assert_eq!(frame[0], 0x32);
//!
//! let mut decoder = Decoder::new();
//! let (head, tail) = frame.split_at(3);
//! assert_eq!(decoder.feed(head).count(), 0);
//!
//! let packet = decoder.feed(tail).next().unwrap().unwrap();
//! assert_eq!(packet.packet_type, PacketType::Publish);
//! assert_eq!(packet.flags, 0b0010);
//! ```

use alloc::vec::Vec;
use core::mem;

use super::error::{DecodeError, EncodeError};
use super::message::QoS;
use super::options::ConnectOptions;

// Fixed header first bytes for the frames whose flags nibble is fixed.
const CONNECT: u8 = 0x10;
const CONNACK: u8 = 0x20;
const PUBLISH: u8 = 0x30;
const PUBACK: u8 = 0x40;
const PUBREC: u8 = 0x50;
const PUBREL: u8 = 0x62;
const PUBCOMP: u8 = 0x70;
const SUBSCRIBE: u8 = 0x82;
const SUBACK: u8 = 0x90;
const UNSUBSCRIBE: u8 = 0xA2;
const UNSUBACK: u8 = 0xB0;
const PINGREQ: u8 = 0xC0;
const PINGRESP: u8 = 0xD0;
const DISCONNECT: u8 = 0xE0;

/// Protocol name carried in CONNECT.
pub const PROTOCOL_NAME: &str = "MQTT";
/// Protocol level for MQTT 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Largest value a four-byte remaining-length field can carry.
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Largest length-prefixed string or binary field.
const MAX_FIELD_LENGTH: usize = u16::MAX as usize;

pub(crate) const CONNECT_FLAG_USERNAME: u8 = 0x80;
pub(crate) const CONNECT_FLAG_PASSWORD: u8 = 0x40;
pub(crate) const CONNECT_FLAG_WILL_RETAIN: u8 = 0x20;
pub(crate) const CONNECT_FLAG_WILL: u8 = 0x04;
pub(crate) const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;
pub(crate) const CONNECT_WILL_QOS_SHIFT: u8 = 3;

pub(crate) const PUBLISH_FLAG_DUP: u8 = 0x08;
pub(crate) const PUBLISH_FLAG_RETAIN: u8 = 0x01;
pub(crate) const PUBLISH_QOS_SHIFT: u8 = 1;

/// The fourteen MQTT 3.1.1 control packet types.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Client request to connect.
    Connect = 1,
    /// Connect acknowledgment.
    ConnAck = 2,
    /// Application message.
    Publish = 3,
    /// QoS 1 publish acknowledgment.
    PubAck = 4,
    /// QoS 2 publish received.
    PubRec = 5,
    /// QoS 2 publish release.
    PubRel = 6,
    /// QoS 2 publish complete.
    PubComp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgment.
    SubAck = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgment.
    UnsubAck = 11,
    /// Keep-alive ping.
    PingReq = 12,
    /// Keep-alive ping response.
    PingResp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Maps the high nibble of a fixed header to a packet type. The reserved
    /// values 0 and 15 yield `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Connect,
            2 => Self::ConnAck,
            3 => Self::Publish,
            4 => Self::PubAck,
            5 => Self::PubRec,
            6 => Self::PubRel,
            7 => Self::PubComp,
            8 => Self::Subscribe,
            9 => Self::SubAck,
            10 => Self::Unsubscribe,
            11 => Self::UnsubAck,
            12 => Self::PingReq,
            13 => Self::PingResp,
            14 => Self::Disconnect,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::ConnAck => "CONNACK",
            Self::Publish => "PUBLISH",
            Self::PubAck => "PUBACK",
            Self::PubRec => "PUBREC",
            Self::PubRel => "PUBREL",
            Self::PubComp => "PUBCOMP",
            Self::Subscribe => "SUBSCRIBE",
            Self::SubAck => "SUBACK",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::UnsubAck => "UNSUBACK",
            Self::PingReq => "PINGREQ",
            Self::PingResp => "PINGRESP",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

/// Encodes `len` as an MQTT remaining-length field.
///
/// Each byte carries seven value bits, low group first, with the high bit set
/// while more bytes follow.
///
/// # Errors
///
/// [`EncodeError::LengthOverflow`] if `len` exceeds [`MAX_REMAINING_LENGTH`].
pub fn encode_remaining_length(mut len: usize) -> Result<heapless::Vec<u8, 4>, EncodeError> {
    if len > MAX_REMAINING_LENGTH {
        return Err(EncodeError::LengthOverflow);
    }
    let mut out = heapless::Vec::new();
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte).map_err(|_| EncodeError::LengthOverflow)?;
        if len == 0 {
            return Ok(out);
        }
    }
}

/// Decodes a remaining-length field from the front of `bytes`.
///
/// Returns the value and the number of bytes it occupied, or `None` if `bytes`
/// ends before the field does.
///
/// # Errors
///
/// [`DecodeError::MalformedLength`] if the fourth byte still has its
/// continuation bit set.
pub fn decode_remaining_length(bytes: &[u8]) -> Result<Option<(usize, usize)>, DecodeError> {
    let mut value = 0usize;
    for (i, byte) in bytes.iter().enumerate() {
        value |= ((byte & 0x7F) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        if i == 3 {
            return Err(DecodeError::MalformedLength);
        }
    }
    Ok(None)
}

fn frame(first_byte: u8, body: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let length = encode_remaining_length(body.len())?;
    let mut out = Vec::with_capacity(1 + length.len() + body.len());
    out.push(first_byte);
    out.extend_from_slice(&length);
    out.extend_from_slice(body);
    Ok(out)
}

fn put_binary(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    if bytes.len() > MAX_FIELD_LENGTH {
        return Err(EncodeError::StringTooLong);
    }
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn put_str(buf: &mut Vec<u8>, value: &str) -> Result<(), EncodeError> {
    put_binary(buf, value.as_bytes())
}

fn ack(first_byte: u8, packet_id: u16) -> Vec<u8> {
    let [hi, lo] = packet_id.to_be_bytes();
    alloc::vec![first_byte, 0x02, hi, lo]
}

/// Builds a CONNECT frame.
///
/// The payload carries the client id, then the will topic and message, then
/// the user name and password, each only when present.
pub fn encode_connect(options: &ConnectOptions) -> Result<Vec<u8>, EncodeError> {
    if options.password.is_some() && options.username.is_none() {
        return Err(EncodeError::PasswordWithoutUsername);
    }

    let mut flags = 0u8;
    if options.username.is_some() {
        flags |= CONNECT_FLAG_USERNAME;
    }
    if options.password.is_some() {
        flags |= CONNECT_FLAG_PASSWORD;
    }
    if let Some(will) = &options.will {
        flags |= CONNECT_FLAG_WILL | ((will.qos as u8) << CONNECT_WILL_QOS_SHIFT);
        if will.retain {
            flags |= CONNECT_FLAG_WILL_RETAIN;
        }
    }
    if options.clean_session {
        flags |= CONNECT_FLAG_CLEAN_SESSION;
    }

    let mut body = Vec::new();
    // --- Variable Header ---
    put_str(&mut body, PROTOCOL_NAME)?;
    body.push(PROTOCOL_LEVEL);
    body.push(flags);
    body.extend_from_slice(&options.keep_alive_interval.to_be_bytes());

    // --- Payload ---
    put_str(&mut body, &options.client_id)?;
    if let Some(will) = &options.will {
        put_str(&mut body, &will.topic)?;
        put_str(&mut body, &will.message)?;
    }
    if let Some(username) = &options.username {
        put_str(&mut body, username)?;
    }
    if let Some(password) = &options.password {
        put_str(&mut body, password)?;
    }

    frame(CONNECT, &body)
}

/// Builds a PUBLISH frame. The packet id is written only for QoS 1 and 2.
pub fn encode_publish(
    qos: QoS,
    duplicate: bool,
    retain: bool,
    packet_id: u16,
    topic: &str,
    payload: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let mut first_byte = PUBLISH | ((qos as u8) << PUBLISH_QOS_SHIFT);
    if duplicate {
        first_byte |= PUBLISH_FLAG_DUP;
    }
    if retain {
        first_byte |= PUBLISH_FLAG_RETAIN;
    }

    let mut body = Vec::with_capacity(2 + topic.len() + 2 + payload.len());
    put_str(&mut body, topic)?;
    if qos != QoS::AtMostOnce {
        body.extend_from_slice(&packet_id.to_be_bytes());
    }
    body.extend_from_slice(payload);

    frame(first_byte, &body)
}

/// Builds a SUBSCRIBE frame requesting each `(filter, qos)` pair.
pub fn encode_subscribe(packet_id: u16, topics: &[(&str, QoS)]) -> Result<Vec<u8>, EncodeError> {
    let mut body = Vec::new();
    body.extend_from_slice(&packet_id.to_be_bytes());
    for (topic, qos) in topics {
        put_str(&mut body, topic)?;
        body.push(*qos as u8);
    }
    frame(SUBSCRIBE, &body)
}

/// Builds an UNSUBSCRIBE frame.
pub fn encode_unsubscribe(packet_id: u16, topics: &[&str]) -> Result<Vec<u8>, EncodeError> {
    let mut body = Vec::new();
    body.extend_from_slice(&packet_id.to_be_bytes());
    for topic in topics {
        put_str(&mut body, topic)?;
    }
    frame(UNSUBSCRIBE, &body)
}

/// Builds a PUBACK frame.
pub fn encode_puback(packet_id: u16) -> Vec<u8> {
    ack(PUBACK, packet_id)
}

/// Builds a PUBREC frame.
pub fn encode_pubrec(packet_id: u16) -> Vec<u8> {
    ack(PUBREC, packet_id)
}

/// Builds a PUBREL frame. Its fixed-header flags are `0b0010`.
pub fn encode_pubrel(packet_id: u16) -> Vec<u8> {
    ack(PUBREL, packet_id)
}

/// Builds a PUBCOMP frame.
pub fn encode_pubcomp(packet_id: u16) -> Vec<u8> {
    ack(PUBCOMP, packet_id)
}

/// Builds a PINGREQ frame.
pub fn encode_ping() -> Vec<u8> {
    alloc::vec![PINGREQ, 0x00]
}

/// Builds a DISCONNECT frame.
pub fn encode_disconnect() -> Vec<u8> {
    alloc::vec![DISCONNECT, 0x00]
}

// Broker-side frames. The engine never sends these; they exist so tests,
// benchmarks and simulators can produce the traffic a broker would.

/// Builds a CONNACK frame.
pub fn encode_connack(session_present: bool, return_code: u8) -> Vec<u8> {
    alloc::vec![CONNACK, 0x02, session_present as u8, return_code]
}

/// Builds a SUBACK frame with one raw return code per requested filter.
pub fn encode_suback(packet_id: u16, return_codes: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let mut body = Vec::with_capacity(2 + return_codes.len());
    body.extend_from_slice(&packet_id.to_be_bytes());
    body.extend_from_slice(return_codes);
    frame(SUBACK, &body)
}

/// Builds an UNSUBACK frame.
pub fn encode_unsuback(packet_id: u16) -> Vec<u8> {
    ack(UNSUBACK, packet_id)
}

/// Builds a PINGRESP frame.
pub fn encode_pingresp() -> Vec<u8> {
    alloc::vec![PINGRESP, 0x00]
}

/// One complete frame split off the inbound byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    /// Packet type from the high nibble of the fixed header.
    pub packet_type: PacketType,
    /// Flags from the low nibble of the fixed header.
    pub flags: u8,
    /// The frame body: variable header and payload, `remaining length` bytes.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    AwaitingHeaderByte,
    AwaitingRemainingLength {
        packet_type: PacketType,
        flags: u8,
        value: usize,
        consumed: u8,
    },
    AwaitingPayload {
        packet_type: PacketType,
        flags: u8,
        remaining: usize,
    },
}

/// Incremental frame decoder.
///
/// The decoder keeps its position between calls, so a frame may arrive split
/// across any number of chunks, and one chunk may hold many frames. After a
/// complete frame is returned, or after any error, the decoder is back at the
/// start of a fixed header.
#[derive(Debug)]
pub struct Decoder {
    state: ParseState,
    buffer: Vec<u8>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Creates a decoder waiting for a fixed-header byte.
    pub fn new() -> Self {
        Self {
            state: ParseState::AwaitingHeaderByte,
            buffer: Vec::new(),
        }
    }

    /// Discards any partially received frame.
    pub fn reset(&mut self) {
        self.state = ParseState::AwaitingHeaderByte;
        self.buffer = Vec::new();
    }

    /// Returns `true` when no partial frame is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::AwaitingHeaderByte
    }

    /// Consumes bytes from the front of `input` until one frame completes or
    /// `input` runs out.
    ///
    /// On `Ok(Some(_))`, `input` is left pointing at the first byte after the
    /// frame. On error the decoder resets and the offending byte has been
    /// consumed.
    pub fn decode_next(&mut self, input: &mut &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        let result = self.step(input);
        if result.is_err() {
            self.reset();
        }
        result
    }

    /// Returns an iterator over the frames completed by `bytes`.
    ///
    /// The iterator stops after the first error; bytes following a malformed
    /// frame are dropped.
    pub fn feed<'a>(&'a mut self, bytes: &'a [u8]) -> Feed<'a> {
        Feed {
            decoder: self,
            input: bytes,
            failed: false,
        }
    }

    fn step(&mut self, input: &mut &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        while !input.is_empty() {
            match self.state {
                ParseState::AwaitingHeaderByte => {
                    let byte = take_byte(input);
                    let kind = byte >> 4;
                    let packet_type =
                        PacketType::from_u8(kind).ok_or(DecodeError::InvalidPacketType(kind))?;
                    self.state = ParseState::AwaitingRemainingLength {
                        packet_type,
                        flags: byte & 0x0F,
                        value: 0,
                        consumed: 0,
                    };
                }
                ParseState::AwaitingRemainingLength {
                    packet_type,
                    flags,
                    value,
                    consumed,
                } => {
                    let byte = take_byte(input);
                    let value = value | (((byte & 0x7F) as usize) << (7 * consumed));
                    let consumed = consumed + 1;
                    if byte & 0x80 == 0 {
                        if value == 0 {
                            return Ok(Some(self.emit(packet_type, flags)));
                        }
                        self.state = ParseState::AwaitingPayload {
                            packet_type,
                            flags,
                            remaining: value,
                        };
                    } else if consumed == 4 {
                        return Err(DecodeError::MalformedLength);
                    } else {
                        self.state = ParseState::AwaitingRemainingLength {
                            packet_type,
                            flags,
                            value,
                            consumed,
                        };
                    }
                }
                ParseState::AwaitingPayload {
                    packet_type,
                    flags,
                    remaining,
                } => {
                    let wanted = remaining - self.buffer.len();
                    let take = wanted.min(input.len());
                    self.buffer
                        .try_reserve(take)
                        .map_err(|_| DecodeError::OutOfMemory)?;
                    self.buffer.extend_from_slice(&input[..take]);
                    *input = &input[take..];
                    if self.buffer.len() == remaining {
                        return Ok(Some(self.emit(packet_type, flags)));
                    }
                }
            }
        }
        Ok(None)
    }

    fn emit(&mut self, packet_type: PacketType, flags: u8) -> DecodedPacket {
        let payload = mem::take(&mut self.buffer);
        self.state = ParseState::AwaitingHeaderByte;
        DecodedPacket {
            packet_type,
            flags,
            payload,
        }
    }
}

fn take_byte(input: &mut &[u8]) -> u8 {
    let byte = input[0];
    *input = &input[1..];
    byte
}

/// Iterator returned by [`Decoder::feed`].
#[derive(Debug)]
pub struct Feed<'a> {
    decoder: &'a mut Decoder,
    input: &'a [u8],
    failed: bool,
}

impl Iterator for Feed<'_> {
    type Item = Result<DecodedPacket, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.decoder.decode_next(&mut self.input) {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
